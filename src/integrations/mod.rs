//! External integrations.
//!
//! Each integration is a trait object so use cases can be exercised with a
//! stand-in. Built once from configuration during wiring.

pub mod places;

use std::sync::Arc;

use crate::config::schema::IntegrationsConfig;
use places::{DisabledPlaces, GoogleMapsPlaces, PlacesIntegration};

#[derive(Clone)]
pub struct Integrations {
    pub places: Arc<dyn PlacesIntegration>,
}

impl Integrations {
    pub fn new(places: Arc<dyn PlacesIntegration>) -> Self {
        Self { places }
    }

    /// Build from configuration. A places client that cannot be built is
    /// logged and replaced by a disabled one.
    pub fn create(config: &IntegrationsConfig) -> Self {
        let places: Arc<dyn PlacesIntegration> = if config.places.maps_key.is_empty() {
            tracing::info!("Places integration disabled: no API key");
            Arc::new(DisabledPlaces)
        } else {
            match GoogleMapsPlaces::new(&config.places) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::error!(error = %e, "Places integration unavailable");
                    Arc::new(DisabledPlaces)
                }
            }
        };
        Self { places }
    }
}

impl std::fmt::Debug for Integrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrations")
            .field("places_enabled", &self.places.is_enabled())
            .finish()
    }
}

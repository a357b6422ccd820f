//! Use cases exposed over HTTP.
//!
//! Built from the wiring context; cheap to clone into route state.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::context::BootstrapContext;
use crate::integrations::places::{Place, PlaceType, PlacesError};
use crate::nosql::{Document, NoSqlError};

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error(transparent)]
    Datastore(#[from] NoSqlError),

    #[error(transparent)]
    Places(#[from] PlacesError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasourceStatus {
    pub name: &'static str,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub scope: String,
    pub mode: &'static str,
    pub datasources: Vec<DatasourceStatus>,
    pub places_enabled: bool,
}

#[derive(Clone)]
pub struct UseCases {
    context: Arc<BootstrapContext>,
}

impl UseCases {
    pub fn create(context: Arc<BootstrapContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BootstrapContext {
        &self.context
    }

    pub fn service_status(&self) -> ServiceStatus {
        let config = &self.context.config;
        ServiceStatus {
            version: env!("CARGO_PKG_VERSION"),
            scope: config.scope.clone(),
            mode: config.server.mode.as_str(),
            datasources: self
                .context
                .datasources
                .entries()
                .into_iter()
                .map(|(name, accessor)| DatasourceStatus {
                    name,
                    collection: accessor.name().to_string(),
                })
                .collect(),
            places_enabled: self.context.integrations.places.is_enabled(),
        }
    }

    /// Hotels stored locally, optionally filtered by exact name.
    pub async fn list_hotels(&self, name: Option<&str>) -> Result<Vec<Document>, UseCaseError> {
        let mut filter = Document::new();
        if let Some(name) = name {
            filter.insert("name".into(), name.into());
        }
        Ok(self.context.datasources.hotels.find(filter).await?)
    }

    /// Lodging near a free-text location.
    pub async fn find_lodging(
        &self,
        query: &str,
        radius_meters: Option<u32>,
    ) -> Result<Vec<Place>, UseCaseError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(UseCaseError::InvalidRequest("query must not be empty".into()));
        }
        let radius =
            radius_meters.unwrap_or(self.context.config.integrations.places.radius_meters);
        Ok(self
            .context
            .integrations
            .places
            .get_places(query, radius, PlaceType::Lodging)
            .await?)
    }
}

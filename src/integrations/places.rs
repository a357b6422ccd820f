//! Place lookup integration (Google Maps Places text search).
//!
//! # Responsibilities
//! - Query nearby places of a given type for a free-text location
//! - Map the API payload to `Place` values
//!
//! # Design Decisions
//! - Construction does no I/O; the first request opens the connection
//! - Missing API key yields a disabled integration rather than a failure

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::PlacesConfig;

/// Place categories the service searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceType {
    Lodging,
}

impl PlaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceType::Lodging => "lodging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A place returned by the lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    pub address: Option<String>,
    pub location: Option<LatLng>,
    pub rating: Option<f64>,
}

/// Errors that can occur during place lookups.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("places integration is disabled")]
    Disabled,

    #[error("places request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("places API returned {status}: {message}")]
    Api { status: String, message: String },
}

#[async_trait]
pub trait PlacesIntegration: Send + Sync {
    async fn get_places(
        &self,
        query: &str,
        radius_meters: u32,
        place_type: PlaceType,
    ) -> Result<Vec<Place>, PlacesError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPlaces;

#[async_trait]
impl PlacesIntegration for DisabledPlaces {
    async fn get_places(&self, _: &str, _: u32, _: PlaceType) -> Result<Vec<Place>, PlacesError> {
        Err(PlacesError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Google Maps Places client.
#[derive(Clone)]
pub struct GoogleMapsPlaces {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl GoogleMapsPlaces {
    pub fn new(config: &PlacesConfig) -> Result<Self, PlacesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.maps_key.clone(),
        })
    }
}

#[async_trait]
impl PlacesIntegration for GoogleMapsPlaces {
    async fn get_places(
        &self,
        query: &str,
        radius_meters: u32,
        place_type: PlaceType,
    ) -> Result<Vec<Place>, PlacesError> {
        let radius = radius_meters.to_string();
        let response: TextSearchResponse = self
            .client
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&[
                ("query", query),
                ("radius", radius.as_str()),
                ("type", place_type.as_str()),
                ("key", self.key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(query = %query, status = %response.status, results = response.results.len(), "Places lookup");
        response.into_places()
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: String,
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

impl TextSearchResponse {
    fn into_places(self) -> Result<Vec<Place>, PlacesError> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(self
                .results
                .into_iter()
                .map(|r| Place {
                    place_id: r.place_id,
                    name: r.name,
                    address: r.formatted_address,
                    location: r.geometry.map(|g| g.location),
                    rating: r.rating,
                })
                .collect()),
            _ => Err(PlacesError::Api {
                message: self.error_message.unwrap_or_default(),
                status: self.status,
            }),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every collection has an endpoint, database and collection name
//! - Validate endpoint schemes and value ranges (timeouts > 0)
//! - Detect two logical collections pointing at the same physical collection
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::config::schema::{CollectionConfig, ServiceConfig};

/// Endpoint schemes the connector knows how to open.
pub const SUPPORTED_SCHEMES: &[&str] = &["memory", "mongodb", "mongodb+srv"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate the whole service configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::new("server.host", "must not be empty"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    let mut seen: HashMap<(String, String, String), &str> = HashMap::new();
    for (key, collection) in config.nosql.entries() {
        if let Err(mut found) = validate_collection(&format!("nosql.{}", key), collection) {
            errors.append(&mut found);
            continue;
        }
        let physical = (
            collection.endpoint.clone(),
            collection.database.clone(),
            collection.collection.clone(),
        );
        if let Some(previous) = seen.insert(physical, key) {
            errors.push(ValidationError::new(
                format!("nosql.{}.collection", key),
                format!("same collection as nosql.{}", previous),
            ));
        }
    }

    let places = &config.integrations.places;
    if !places.maps_key.is_empty() && Url::parse(&places.base_url).is_err() {
        errors.push(ValidationError::new(
            "integrations.places.base_url",
            "must be an absolute URL",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single collection block. `prefix` is used for field paths.
pub fn validate_collection(
    prefix: &str,
    config: &CollectionConfig,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.endpoint) {
        Ok(url) if SUPPORTED_SCHEMES.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            format!("{}.endpoint", prefix),
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            format!("{}.endpoint", prefix),
            format!("invalid endpoint '{}': {}", config.endpoint, e),
        )),
    }
    if config.database.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{}.database", prefix),
            "must not be empty",
        ));
    }
    if config.collection.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{}.collection", prefix),
            "must not be empty",
        ));
    }
    if config.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            format!("{}.connect_timeout_secs", prefix),
            "must be greater than zero",
        ));
    }
    if let Some(credentials) = &config.credentials {
        if credentials.username.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.credentials.username", prefix),
                "must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = ServiceConfig::default();
        config.nosql.hotels.endpoint = "redis://localhost".into();
        config.nosql.locations.collection = String::new();
        config.server.request_timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"nosql.hotels.endpoint"));
        assert!(fields.contains(&"nosql.locations.collection"));
        assert!(fields.contains(&"server.request_timeout_secs"));
    }

    #[test]
    fn test_detects_shared_physical_collection() {
        let mut config = ServiceConfig::default();
        config.nosql.services.collection = "hotels".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "nosql.services.collection");
        assert!(errors[0].message.contains("nosql.hotels"));
    }

    #[test]
    fn test_accepts_mongodb_endpoints() {
        let mut config = CollectionConfig::memory("hotels");
        config.endpoint = "mongodb+srv://cluster0.example.net".into();
        assert!(validate_collection("nosql.hotels", &config).is_ok());
    }
}

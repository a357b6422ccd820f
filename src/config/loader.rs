//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file settings.
pub const ENV_SCOPE: &str = "SCOPE";
pub const ENV_PORT: &str = "PORT";
pub const ENV_MODE: &str = "SERVER_MODE";
pub const ENV_MAPS_KEY: &str = "GCP_MAPS_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_from_str(&content, |var| std::env::var(var).ok())
}

/// Parse a TOML document, apply overrides from `lookup`, and validate.
pub fn load_config_from_str<F>(content: &str, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: ServiceConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the supported environment overrides in place.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(scope) = lookup(ENV_SCOPE) {
        config.scope = scope;
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_PORT,
            message: format!("'{}' is not a port: {}", port, e),
        })?;
    }
    if let Some(mode) = lookup(ENV_MODE) {
        config.server.mode = mode
            .parse()
            .map_err(|message| ConfigError::Env { var: ENV_MODE, message })?;
    }
    if let Some(key) = lookup(ENV_MAPS_KEY) {
        config.integrations.places.maps_key = key;
    }
    Ok(())
}

//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, after config is loaded
//! - Pick verbosity and format from the server mode
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over configuration
//! - JSON format for release, pretty format for debug

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ObservabilityConfig, ServerMode};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig, mode: ServerMode) -> String {
    if !config.log_level.trim().is_empty() {
        return config.log_level.trim().to_string();
    }
    match mode {
        ServerMode::Debug => "globalstay_service=debug,tower_http=debug".to_string(),
        ServerMode::Release => "info".to_string(),
    }
}

pub fn uses_json(config: &ObservabilityConfig, mode: ServerMode) -> bool {
    config.json || mode == ServerMode::Release
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(
    config: &ObservabilityConfig,
    mode: ServerMode,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = default_directive(config, mode);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
    let json = uses_json(config, mode);

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()?;

    tracing::debug!(mode = %mode, filter = %directive, json, "Logging initialized");
    Ok(())
}

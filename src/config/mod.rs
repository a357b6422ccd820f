//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → passed explicitly (Arc) into bootstrap and wiring
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide accessor
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CollectionConfig, Credentials, NoSqlConfig, ObservabilityConfig, PlacesConfig, ServerConfig,
    ServerMode, ServiceConfig,
};

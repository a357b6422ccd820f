//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scope identifier of the running environment (e.g. "local", "prod").
    pub scope: String,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-collection datastore settings.
    pub nosql: NoSqlConfig,

    /// Third-party integration settings.
    pub integrations: IntegrationsConfig,
}

/// Runtime mode. Controls log verbosity and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Debug,
    Release,
}

impl ServerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMode::Debug => "debug",
            ServerMode::Release => "release",
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(ServerMode::Debug),
            "release" => Ok(ServerMode::Release),
            other => Err(format!("unknown server mode '{}'", other)),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Listening port. 0 asks the OS for an ephemeral port.
    pub port: u16,

    /// Debug or release mode.
    pub mode: ServerMode,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: ServerMode::Debug,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// `host:port` string used to bind the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive. Empty means "derive from mode".
    pub log_level: String,

    /// Force JSON log output. Release mode always logs JSON.
    pub json: bool,
}

/// Settings for every logical collection the service opens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NoSqlConfig {
    /// Tracking collection recording applied migrations.
    pub migrations: CollectionConfig,
    pub hotels: CollectionConfig,
    pub locations: CollectionConfig,
    pub services: CollectionConfig,
    pub reservations: CollectionConfig,
}

impl Default for NoSqlConfig {
    fn default() -> Self {
        Self {
            migrations: CollectionConfig::memory("migrations"),
            hotels: CollectionConfig::memory("hotels"),
            locations: CollectionConfig::memory("locations"),
            services: CollectionConfig::memory("services"),
            reservations: CollectionConfig::memory("reservations"),
        }
    }
}

impl NoSqlConfig {
    /// Logical name / config pairs in declared order.
    pub fn entries(&self) -> [(&'static str, &CollectionConfig); 5] {
        [
            ("migrations", &self.migrations),
            ("hotels", &self.hotels),
            ("locations", &self.locations),
            ("services", &self.services),
            ("reservations", &self.reservations),
        ]
    }
}

/// Connection settings for one logical collection.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionConfig {
    /// Connection endpoint (`memory://...`, `mongodb://...`).
    pub endpoint: String,

    /// Database name.
    pub database: String,

    /// Collection name.
    pub collection: String,

    /// Optional credentials.
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Connection establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

impl CollectionConfig {
    /// In-memory collection in the `globalstay` database.
    pub fn memory(collection: &str) -> Self {
        Self {
            endpoint: "memory://local".to_string(),
            database: "globalstay".to_string(),
            collection: collection.to_string(),
            credentials: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self::memory("")
    }
}

// Hand-written so that passwords never reach the logs.
impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("credentials", &self.credentials.as_ref().map(|c| &c.username))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Username/password pair for a datastore.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Third-party integrations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub places: PlacesConfig,
}

/// Place lookup (Google Maps) settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlacesConfig {
    /// API key. Empty disables the integration.
    pub maps_key: String,

    /// Base URL of the places API.
    pub base_url: String,

    /// Default search radius in meters.
    pub radius_meters: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            maps_key: String::new(),
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            radius_meters: 5000,
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for PlacesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacesConfig")
            .field("maps_key", &if self.maps_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("radius_meters", &self.radius_meters)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

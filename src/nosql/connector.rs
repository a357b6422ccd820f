//! Endpoint-scheme dispatch across drivers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CollectionConfig;
use crate::nosql::driver::{Connection, Connector};
use crate::nosql::error::{NoSqlError, NoSqlResult};
use crate::nosql::memory::MemoryConnector;

/// Picks a driver from the endpoint scheme.
///
/// `memory://` always resolves; `mongodb://` and `mongodb+srv://` resolve
/// when the crate is built with the `mongodb` feature.
#[derive(Clone, Default)]
pub struct SchemeConnector {
    memory: MemoryConnector,
}

impl SchemeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing in-memory connector for `memory://` endpoints.
    pub fn with_memory(memory: MemoryConnector) -> Self {
        Self { memory }
    }
}

fn scheme(endpoint: &str) -> &str {
    endpoint.split_once("://").map(|(s, _)| s).unwrap_or("")
}

#[async_trait]
impl Connector for SchemeConnector {
    async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>> {
        match scheme(&config.endpoint) {
            "memory" => self.memory.connect(config).await,
            #[cfg(feature = "mongodb")]
            "mongodb" | "mongodb+srv" => crate::nosql::mongo::MongoConnector.connect(config).await,
            #[cfg(not(feature = "mongodb"))]
            "mongodb" | "mongodb+srv" => Err(NoSqlError::Config(format!(
                "'{}' needs the `mongodb` feature",
                config.endpoint
            ))),
            other => Err(NoSqlError::Config(format!(
                "unsupported endpoint scheme '{}'",
                other
            ))),
        }
    }
}

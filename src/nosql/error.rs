//! Datastore error definitions.

use thiserror::Error;

/// Errors surfaced by connectors, connections and collection stores.
#[derive(Debug, Error)]
pub enum NoSqlError {
    /// Malformed or unsupported collection settings.
    #[error("invalid collection config: {0}")]
    Config(String),

    /// Transport or authentication failure while opening a connection.
    #[error("connection to '{collection}' failed: {message}")]
    Connection { collection: String, message: String },

    /// Connecting did not finish within the configured timeout.
    #[error("connection to '{collection}' timed out after {secs}s")]
    Timeout { collection: String, secs: u64 },

    /// The handle is not in a state that allows the call.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A read or write against a collection failed.
    #[error("operation {operation} on '{collection}' failed: {message}")]
    Operation {
        collection: String,
        operation: &'static str,
        message: String,
    },

    /// A write would violate a unique index.
    #[error("duplicate key on '{collection}' index '{index}'")]
    DuplicateKey { collection: String, index: String },

    /// Releasing the connection failed.
    #[error("disconnect of '{collection}' failed: {message}")]
    Disconnect { collection: String, message: String },
}

impl NoSqlError {
    pub fn operation(
        collection: impl Into<String>,
        operation: &'static str,
        message: impl ToString,
    ) -> Self {
        NoSqlError::Operation {
            collection: collection.into(),
            operation,
            message: message.to_string(),
        }
    }
}

/// Result type for datastore operations.
pub type NoSqlResult<T> = Result<T, NoSqlError>;

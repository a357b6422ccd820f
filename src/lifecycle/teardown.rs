//! Scoped release of acquired datastore connections.
//!
//! # Responsibilities
//! - Remember every handle the moment it is acquired
//! - Disconnect in reverse acquisition order, exactly once
//! - Keep going when a disconnect fails; log and aggregate the failure
//!
//! # Design Decisions
//! - `run` consumes the list, so it cannot be invoked twice
//! - Dropping an un-run list (panic unwinding, early return) schedules the
//!   same release on the current Tokio runtime

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::nosql::{ClientHandle, NoSqlError};

/// A disconnect that failed during teardown. Logged, never re-raised.
#[derive(Debug, Error)]
#[error("disconnect of '{collection}' failed: {source}")]
pub struct TeardownError {
    pub collection: String,
    #[source]
    pub source: NoSqlError,
}

/// Outcome of a teardown run.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Collections released, in release order.
    pub released: Vec<String>,
    pub failures: Vec<TeardownError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} released, {} failed",
            self.released.len(),
            self.failures.len()
        )
    }
}

/// Ordered list of acquired handles awaiting release.
#[derive(Default)]
pub struct Teardown {
    handles: Vec<Arc<ClientHandle>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly acquired handle.
    pub fn register(&mut self, handle: Arc<ClientHandle>) {
        tracing::trace!(collection = %handle.key(), position = self.handles.len(), "Teardown registered");
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Logical names in acquisition order.
    pub fn keys(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.key()).collect()
    }

    /// Disconnect everything, last acquired first.
    pub async fn run(mut self) -> TeardownReport {
        let handles = std::mem::take(&mut self.handles);
        release_all(handles).await
    }
}

async fn release_all(handles: Vec<Arc<ClientHandle>>) -> TeardownReport {
    let mut report = TeardownReport::default();
    for handle in handles.into_iter().rev() {
        let collection = handle.key().to_string();
        match handle.disconnect().await {
            Ok(()) => {
                tracing::info!(collection = %collection, "Collection disconnected");
                report.released.push(collection);
            }
            Err(source) => {
                tracing::warn!(collection = %collection, error = %source, "Disconnect failed");
                report.failures.push(TeardownError { collection, source });
            }
        }
    }
    report
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        tracing::warn!(pending = handles.len(), "Teardown dropped without running");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let report = release_all(handles).await;
                    tracing::warn!(%report, "Deferred teardown finished");
                });
            }
            Err(_) => {
                tracing::error!("No runtime available; connections left to process exit");
            }
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown").field("handles", &self.keys()).finish()
    }
}

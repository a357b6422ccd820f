//! Datastore bootstrap orchestration.
//!
//! # Responsibilities
//! - Connect the tracking collection first, then every dependent collection
//!   in declared order
//! - Register each handle for teardown the moment it is acquired
//! - Migrate a collection right after connecting it, before anything else
//!   can see it
//! - On the first failure, stop, release everything acquired so far (last
//!   first) and return that failure
//!
//! # Design Decisions
//! - Strictly sequential; no step is retried
//! - Teardown failures are logged and never replace the original error
//! - Shutdown is checked between steps, so a signal during startup stops
//!   further connects
//! - A panic while acquiring releases what was acquired, then resumes
//!   unwinding

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;

use crate::config::{CollectionConfig, NoSqlConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::teardown::Teardown;
use crate::migrations::{self, MigrationError, MigrationReport, MigrationRunner, MigrationStep};
use crate::nosql::{ClientHandle, ClientRegistry, NoSqlError};

/// Logical name of the tracking collection.
pub const TRACKING_KEY: &str = "migrations";

/// Errors surfaced during bootstrap. All are fatal to startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Malformed collection settings.
    #[error("invalid configuration for '{collection}': {source}")]
    Config {
        collection: String,
        #[source]
        source: NoSqlError,
    },

    /// Transport or authentication failure.
    #[error("cannot connect '{collection}': {source}")]
    Connection {
        collection: String,
        #[source]
        source: NoSqlError,
    },

    /// A handle was used out of order.
    #[error("precondition failed for '{collection}': {source}")]
    Precondition {
        collection: String,
        #[source]
        source: NoSqlError,
    },

    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Shutdown was requested before the collection was connected.
    #[error("bootstrap cancelled before connecting '{collection}'")]
    Cancelled { collection: String },
}

impl BootstrapError {
    fn from_connect(collection: &str, source: NoSqlError) -> Self {
        let collection = collection.to_string();
        match source {
            NoSqlError::Config(_) => BootstrapError::Config { collection, source },
            NoSqlError::Precondition(_) => BootstrapError::Precondition { collection, source },
            _ => BootstrapError::Connection { collection, source },
        }
    }

    /// True when a mutation landed without its record.
    pub fn is_partial_migration(&self) -> bool {
        matches!(self, BootstrapError::Migration(e) if e.is_partial())
    }
}

/// One collection to open, with the steps to apply to it.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    /// Logical name, e.g. "hotels".
    pub key: String,
    pub config: CollectionConfig,
    pub steps: Vec<MigrationStep>,
}

impl CollectionPlan {
    pub fn new(key: impl Into<String>, config: CollectionConfig) -> Self {
        Self {
            key: key.into(),
            config,
            steps: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<MigrationStep>) -> Self {
        self.steps = steps;
        self
    }
}

/// Ordered description of what to open.
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub tracking: CollectionConfig,
    pub collections: Vec<CollectionPlan>,
}

impl BootstrapPlan {
    pub fn new(tracking: CollectionConfig) -> Self {
        Self {
            tracking,
            collections: Vec::new(),
        }
    }

    pub fn collection(mut self, plan: CollectionPlan) -> Self {
        self.collections.push(plan);
        self
    }

    /// The service's fixed order: tracking, hotels (migrated), locations,
    /// services, reservations.
    pub fn from_config(config: &NoSqlConfig) -> Self {
        let mut plan = Self::new(config.migrations.clone());
        for (key, collection) in config.entries() {
            if key == TRACKING_KEY {
                continue;
            }
            plan = plan.collection(
                CollectionPlan::new(key, collection.clone())
                    .with_steps(migrations::steps_for(key, &collection.collection)),
            );
        }
        plan
    }
}

/// Handles opened by a successful bootstrap, in acquisition order.
#[derive(Debug, Default, Clone)]
pub struct DataStores {
    handles: Vec<Arc<ClientHandle>>,
}

impl DataStores {
    fn push(&mut self, handle: Arc<ClientHandle>) {
        self.handles.push(handle);
    }

    pub fn get(&self, key: &str) -> Option<&Arc<ClientHandle>> {
        self.handles.iter().find(|h| h.key() == key)
    }

    pub fn tracking(&self) -> Option<&Arc<ClientHandle>> {
        self.get(TRACKING_KEY)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.key()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        self.handles.iter()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Result of a successful bootstrap. The caller owns `teardown` and must
/// run it on every exit path.
#[derive(Debug)]
pub struct Bootstrapped {
    pub stores: DataStores,
    pub teardown: Teardown,
    pub reports: Vec<MigrationReport>,
}

/// Opens and migrates every collection of a plan.
#[derive(Clone)]
pub struct Bootstrapper {
    registry: ClientRegistry,
}

impl Bootstrapper {
    pub fn new(registry: ClientRegistry) -> Self {
        Self { registry }
    }

    pub async fn bootstrap(&self, plan: BootstrapPlan) -> Result<Bootstrapped, BootstrapError> {
        self.bootstrap_until(plan, &Shutdown::new()).await
    }

    /// Like [`bootstrap`](Self::bootstrap), stopping between steps once
    /// `shutdown` has been triggered.
    pub async fn bootstrap_until(
        &self,
        plan: BootstrapPlan,
        shutdown: &Shutdown,
    ) -> Result<Bootstrapped, BootstrapError> {
        tracing::info!(collections = plan.collections.len() + 1, "Bootstrapping datastores");

        let mut acquired = Bootstrapped {
            stores: DataStores::default(),
            teardown: Teardown::new(),
            reports: Vec::new(),
        };
        let outcome = AssertUnwindSafe(self.acquire(plan, shutdown, &mut acquired))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                tracing::info!(collections = ?acquired.stores.keys(), "Datastores ready");
                Ok(acquired)
            }
            Ok(Err(error)) => {
                tracing::error!(error = %error, "Bootstrap failed, releasing acquired collections");
                Self::release(acquired.teardown).await;
                Err(error)
            }
            Err(panic) => {
                tracing::error!("Bootstrap panicked, releasing acquired collections");
                Self::release(acquired.teardown).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn release(teardown: Teardown) {
        let report = teardown.run().await;
        for failure in &report.failures {
            tracing::warn!(error = %failure, "Teardown after failed bootstrap was incomplete");
        }
    }

    async fn acquire(
        &self,
        plan: BootstrapPlan,
        shutdown: &Shutdown,
        acquired: &mut Bootstrapped,
    ) -> Result<(), BootstrapError> {
        let tracking = self
            .connect(TRACKING_KEY, &plan.tracking, shutdown, acquired)
            .await?;
        let runner = MigrationRunner::new(tracking.collection().map_err(|source| {
            BootstrapError::Precondition {
                collection: TRACKING_KEY.to_string(),
                source,
            }
        })?);

        for collection in plan.collections {
            let handle = self
                .connect(&collection.key, &collection.config, shutdown, acquired)
                .await?;
            if collection.steps.is_empty() {
                continue;
            }

            let precondition = |source| BootstrapError::Precondition {
                collection: collection.key.clone(),
                source,
            };
            let target = handle.collection().map_err(precondition)?;
            let report = runner.run(&target, collection.steps).await.map_err(|e| {
                tracing::error!(collection = %collection.key, step = ?e.step(), error = %e, "Migrations failed");
                e
            })?;
            handle.mark_migrated().map_err(precondition)?;

            tracing::info!(
                collection = %collection.key,
                applied = report.applied.len(),
                skipped = report.skipped.len(),
                "Collection migrated"
            );
            acquired.reports.push(report);
        }
        Ok(())
    }

    async fn connect(
        &self,
        key: &str,
        config: &CollectionConfig,
        shutdown: &Shutdown,
        acquired: &mut Bootstrapped,
    ) -> Result<Arc<ClientHandle>, BootstrapError> {
        if shutdown.is_triggered() {
            return Err(BootstrapError::Cancelled {
                collection: key.to_string(),
            });
        }

        tracing::debug!(collection = %key, database = %config.database, "Connecting collection");
        let handle = self.registry.connect(key, config).await.map_err(|source| {
            tracing::error!(collection = %key, error = %source, "Connection failed");
            BootstrapError::from_connect(key, source)
        })?;
        acquired.teardown.register(handle.clone());
        acquired.stores.push(handle.clone());
        Ok(handle)
    }
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Bootstrap the datastores (connect + migrate)
//! - Wire data sources, integrations and use cases
//! - Bind the listener and serve until shutdown
//! - Tear down every acquired connection on every exit path
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The server runs in its own task, so a panic while serving is observed
//!   as a `JoinError` and teardown still runs
//! - Teardown problems are logged; the caller sees the original error

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::context::ContextFactory;
use crate::datasources::Datasources;
use crate::http::HttpServer;
use crate::integrations::Integrations;
use crate::lifecycle::bootstrap::{
    BootstrapError, BootstrapPlan, Bootstrapped, Bootstrapper, DataStores,
};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::teardown::Teardown;
use crate::migrations::MigrationReport;
use crate::nosql::{ClientRegistry, Connector, NoSqlError};
use crate::usecases::UseCases;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("dependency wiring failed: {0}")]
    Wiring(#[source] NoSqlError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Server(#[source] std::io::Error),

    #[error("HTTP server task panicked: {0}")]
    Panicked(String),
}

/// The service, ready to be started.
pub struct Service {
    config: Arc<ServiceConfig>,
    connector: Arc<dyn Connector>,
    shutdown: Shutdown,
}

impl Service {
    pub fn new(config: Arc<ServiceConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            shutdown: Shutdown::new(),
        }
    }

    /// Use an externally owned shutdown coordinator (e.g. one fed by OS
    /// signals).
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Start, then serve until shutdown.
    pub async fn run(&self) -> Result<(), ServiceError> {
        self.start().await?.wait().await
    }

    /// Bootstrap, wire and bind. Returns once the listener accepts
    /// connections.
    pub async fn start(&self) -> Result<RunningService, ServiceError> {
        let Bootstrapped {
            stores, teardown, ..
        } = self.bootstrap().await?;

        let server = match self.wire(&stores) {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(error = %e, "Wiring failed");
                release(teardown).await;
                return Err(e);
            }
        };

        let listener = match server.bind().await {
            Ok(listener) => listener,
            Err(source) => {
                let e = ServiceError::Bind {
                    address: server.address().to_string(),
                    source,
                };
                tracing::error!(error = %e, "Listener unavailable");
                release(teardown).await;
                return Err(e);
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                release(teardown).await;
                return Err(ServiceError::Bind {
                    address: server.address().to_string(),
                    source,
                });
            }
        };

        tracing::info!(address = %local_addr, "Listening for connections");
        let task = tokio::spawn(server.run(listener, self.shutdown.clone()));

        Ok(RunningService {
            local_addr,
            task,
            teardown,
            shutdown: self.shutdown.clone(),
        })
    }

    /// Connect and migrate every collection, then release them.
    pub async fn migrate(&self) -> Result<Vec<MigrationReport>, ServiceError> {
        let Bootstrapped {
            teardown, reports, ..
        } = self.bootstrap().await?;
        release(teardown).await;
        Ok(reports)
    }

    async fn bootstrap(&self) -> Result<Bootstrapped, ServiceError> {
        let bootstrapper = Bootstrapper::new(ClientRegistry::new(self.connector.clone()));
        let plan = BootstrapPlan::from_config(&self.config.nosql);
        Ok(bootstrapper.bootstrap_until(plan, &self.shutdown).await?)
    }

    fn wire(&self, stores: &DataStores) -> Result<HttpServer, ServiceError> {
        let datasources = Datasources::create(stores).map_err(ServiceError::Wiring)?;
        let integrations = Integrations::create(&self.config.integrations);
        let context = ContextFactory::new(datasources, integrations, self.config.clone()).build();
        Ok(HttpServer::new(&self.config.server, UseCases::create(context)))
    }
}

/// A started service. Owns the teardown of its connections.
pub struct RunningService {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
    teardown: Teardown,
    shutdown: Shutdown,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Wait for the server to stop, then release every connection.
    pub async fn wait(self) -> Result<(), ServiceError> {
        let outcome = match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Server(e)),
            Err(join) => Err(ServiceError::Panicked(panic_message(join))),
        };
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "HTTP server exited abnormally");
        }
        self.shutdown.trigger();
        release(self.teardown).await;
        outcome
    }

    /// Trigger shutdown and wait for completion.
    pub async fn stop(self) -> Result<(), ServiceError> {
        self.shutdown.trigger();
        self.wait().await
    }
}

async fn release(teardown: Teardown) {
    let report = teardown.run().await;
    if report.is_clean() {
        tracing::info!(%report, "Datastores released");
    } else {
        tracing::warn!(%report, "Datastores released with errors");
    }
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

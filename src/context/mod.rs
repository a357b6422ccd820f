//! Dependency wiring.
//!
//! # Data Flow
//! ```text
//! DataStores → Datasources ─┐
//! IntegrationsConfig → Integrations ─┼─▶ ContextFactory::build() → Arc<BootstrapContext>
//! ServiceConfig ────────────┘                                      → UseCases
//! ```
//!
//! Pure composition: nothing here performs I/O.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::datasources::Datasources;
use crate::integrations::Integrations;

/// Everything a use case may depend on.
#[derive(Debug)]
pub struct BootstrapContext {
    pub datasources: Datasources,
    pub integrations: Integrations,
    pub config: Arc<ServiceConfig>,
}

/// Assembles a [`BootstrapContext`].
pub struct ContextFactory {
    datasources: Datasources,
    integrations: Integrations,
    config: Arc<ServiceConfig>,
}

impl ContextFactory {
    pub fn new(
        datasources: Datasources,
        integrations: Integrations,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            datasources,
            integrations,
            config,
        }
    }

    pub fn build(self) -> Arc<BootstrapContext> {
        Arc::new(BootstrapContext {
            datasources: self.datasources,
            integrations: self.integrations,
            config: self.config,
        })
    }
}

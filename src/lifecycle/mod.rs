//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     bootstrap.rs (tracking → hotels + migrations → locations → services → reservations)
//!     → wiring → bind → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal or error → stop accepting → drain → teardown.rs (reverse order)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: tracking collection first, then dependents
//! - Every acquired connection is registered for teardown immediately
//! - Teardown runs on success, on startup failure and after a server panic

pub mod bootstrap;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod teardown;

pub use bootstrap::{
    BootstrapError, BootstrapPlan, Bootstrapped, Bootstrapper, CollectionPlan, DataStores,
};
pub use shutdown::Shutdown;
pub use signals::{shutdown_signal, spawn_signal_listener};
pub use startup::{RunningService, Service, ServiceError};
pub use teardown::{Teardown, TeardownError, TeardownReport};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (collection, step, request_id)
//!
//! Consumers:
//!     → logging.rs subscriber → stdout (pretty in debug, JSON in release)
//! ```

pub mod logging;

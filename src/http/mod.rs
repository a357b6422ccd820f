//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign / propagate x-request-id)
//!     → routes.rs (handlers over UseCases)
//!     → JSON response
//! ```

pub mod request;
pub mod routes;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;

//! GlobalStay service library.
//!
//! Bootstraps the document-store collections (tracking collection first,
//! versioned migrations applied once), wires data sources and integrations
//! into use cases, and serves them over HTTP.

// Core subsystems
pub mod config;
pub mod migrations;
pub mod nosql;

// Wiring
pub mod context;
pub mod datasources;
pub mod integrations;
pub mod usecases;

// Surfaces and cross-cutting concerns
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{Service, ServiceError, Shutdown};

//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router over the use cases
//! - Wire up middleware (CORS, request id, tracing, timeout)
//! - Bind the listener and serve until shutdown

use axum::{body::Body, http::Request, routing::get, Router};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::routes;
use crate::lifecycle::Shutdown;
use crate::usecases::UseCases;

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    address: String,
}

impl HttpServer {
    /// Build the router. Requires the use cases, so routes can only exist
    /// once wiring has completed.
    pub fn new(config: &ServerConfig, usecases: UseCases) -> Self {
        Self {
            router: Self::build_router(config, usecases),
            address: config.bind_address(),
        }
    }

    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, usecases: UseCases) -> Router {
        Router::new()
            .route("/ping", get(routes::ping))
            .route("/status", get(routes::status))
            .route("/hotels", get(routes::hotels))
            .route("/places", get(routes::places))
            .with_state(usecases)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request_id(request).unwrap_or("-"),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
            .layer(CorsLayer::very_permissive())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(&self.address).await
    }

    /// Serve until `shutdown` is triggered, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

//! GlobalStay service.
//!
//! # Architecture Overview
//!
//! ```text
//!   config/service.toml + env
//!            │
//!            ▼
//!   ┌─────────────────┐   ┌──────────────────────────────────────────────┐
//!   │  config loader  │──▶│ bootstrap                                    │
//!   └─────────────────┘   │  migrations (tracking) → hotels (+migrate)   │
//!                         │  → locations → services → reservations       │
//!                         └──────────────────────┬───────────────────────┘
//!                                                ▼
//!                         ┌──────────────────────────────────────────────┐
//!                         │ wiring: datasources + integrations → context │
//!                         │         → use cases                          │
//!                         └──────────────────────┬───────────────────────┘
//!                                                ▼
//!                         ┌──────────────────────────────────────────────┐
//!                         │ http: CORS, request id, trace, timeout       │
//!                         │       /ping /status /hotels /places          │
//!                         └──────────────────────┬───────────────────────┘
//!                                                ▼
//!                              shutdown → teardown (reverse order)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use globalstay_service::config::{self, ServiceConfig};
use globalstay_service::lifecycle::{spawn_signal_listener, Service, Shutdown};
use globalstay_service::nosql::SchemeConnector;
use globalstay_service::observability::logging;

#[derive(Parser)]
#[command(name = "globalstay-service")]
#[command(about = "GlobalStay hotel service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/service.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the datastores and serve HTTP (default)
    Serve,
    /// Apply pending migrations, then exit
    Migrate,
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("globalstay-service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability, config.server.mode) {
        eprintln!("globalstay-service: cannot initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        scope = %config.scope,
        mode = %config.server.mode,
        "globalstay-service starting"
    );

    let outcome = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::CheckConfig => {
            tracing::info!(config = ?config, "Configuration is valid");
            Ok(())
        }
    };

    match outcome {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "globalstay-service failed");
            ExitCode::FAILURE
        }
    }
}

fn service(config: ServiceConfig, shutdown: Shutdown) -> Service {
    Service::new(Arc::new(config), Arc::new(SchemeConnector::new())).with_shutdown(shutdown)
}

async fn serve(config: ServiceConfig) -> Result<(), globalstay_service::ServiceError> {
    let shutdown = Shutdown::new();
    let signals = spawn_signal_listener(shutdown.clone());
    let result = service(config, shutdown).run().await;
    signals.abort();
    result
}

async fn migrate(config: ServiceConfig) -> Result<(), globalstay_service::ServiceError> {
    let shutdown = Shutdown::new();
    let signals = spawn_signal_listener(shutdown.clone());
    let result = service(config, shutdown).migrate().await;
    signals.abort();

    for report in result? {
        tracing::info!(
            collection = %report.collection,
            applied = ?report.applied,
            skipped = ?report.skipped,
            "Migrations"
        );
    }
    Ok(())
}

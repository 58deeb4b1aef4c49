//! assocd - Elasticsearch/Kibana association controller
//!
//! Runs the association controller against an in-memory store, optionally
//! seeded from a JSON fixture.

use assoc_controller::error::{ControllerError, ControllerResult};
use assoc_controller::seed::SeedDocument;
use assoc_controller::{AssocConfig, Controller, InMemoryStore};
use assoc_watches::DynamicWatches;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Association controller CLI
#[derive(Parser)]
#[command(name = "assocd")]
#[command(
    about = "Keeps Kibana backend configuration in sync with Elasticsearch",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ASSOC_CONFIG")]
    config: Option<String>,

    /// Maximum concurrent reconciles
    #[arg(short, long, env = "ASSOC_WORKERS")]
    workers: Option<usize>,

    /// JSON fixture loaded into the store at startup
    #[arg(short, long, env = "ASSOC_SEED")]
    seed: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "ASSOC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ASSOC_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> ControllerResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AssocConfig::load(cli.config.as_deref())
        .map_err(|e| ControllerError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(ControllerError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        config.controller.max_concurrent_reconciles = workers;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.controller.max_concurrent_reconciles,
        "Starting association controller"
    );

    let store = Arc::new(InMemoryStore::with_event_capacity(
        config.store.event_capacity,
    ));
    if let Some(path) = &cli.seed {
        SeedDocument::load(path).await?.apply(&store).await;
    }

    let controller = Controller::new(
        config.controller.clone(),
        store,
        Arc::new(DynamicWatches::new()),
    );
    controller.run(shutdown_signal()).await
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

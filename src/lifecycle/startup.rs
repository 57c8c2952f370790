//! Startup orchestration.
//!
//! # Responsibilities
//! - Load `.env`, then load and validate configuration
//! - Initialize logging and metrics
//! - Start the config watcher
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::auth::UserError;
use crate::config::{load_or_default, watcher::ConfigWatcher, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("seed accounts: {0}")]
    Seed(#[from] UserError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the server until SIGINT/SIGTERM.
pub async fn start(config_path: Option<&Path>) -> Result<(), StartupError> {
    let env_file = dotenvy::dotenv().ok();
    let config = load_or_default(config_path)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "huddle starting");
    if let Some(env_file) = env_file {
        tracing::info!(path = %env_file.display(), "Loaded environment file");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        upload_dir = %config.uploads.base_dir,
        seeded_users = config.users.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable; hot reload disabled");
                    (mpsc::unbounded_channel().1, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let signal_task = tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;
    signal_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

//! TSTO Server
//!
//! Runs the periodic town backup worker and a small admin HTTP listener for
//! status, on-demand backups and backup exports.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tsto_server::config::ServerConfig;
use tsto_server::net;
use tsto_server::state::AppState;
use tsto_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("TSTO Server v{} starting", VERSION);

    // Load configuration
    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );
    if config.debug {
        info!(config = ?config, "Debug mode enabled");
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(
        AppState::new(config.clone(), shutdown_tx)
            .context("Failed to initialize application state")?,
    );
    state
        .start_backups()
        .context("Failed to start backup worker")?;
    info!("Application state initialized");

    // Start the admin listener
    let http_addr: SocketAddr = config
        .http_address()
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.http_address()))?;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;
    info!("Admin server listening on: {}", http_addr);

    let http_state = state.clone();
    let mut http_shutdown_rx = state.shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        net::accept_connections(listener, http_state, &mut http_shutdown_rx).await;
    });

    info!("Server startup complete!");

    // Wait for shutdown signal
    wait_for_shutdown(&state.shutdown_tx).await;

    info!("Shutting down server...");

    if let Err(e) = http_handle.await {
        error!("Admin listener task failed: {}", e);
    }

    // Joining the worker blocks, keep it off the runtime threads
    let backup_state = state.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || backup_state.backups.stop()).await {
        error!("Failed to stop backup worker: {}", e);
    }

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tsto_server=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: &broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}

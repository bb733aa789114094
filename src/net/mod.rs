//! Networking module
//!
//! A small admin listener on top of tokio. Each connection carries exactly
//! one request and is closed after the response.

pub mod handler;
pub mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::AppState;
pub use handler::ConnectionHandler;

/// Accept admin connections until a shutdown signal arrives
pub async fn accept_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!("New admin connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle(stream, addr).await {
                                warn!("Admin connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept admin connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Admin connection acceptor shutting down");
                break;
            }
        }
    }
}

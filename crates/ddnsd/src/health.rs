//! Liveness endpoint: `GET /health` answers `200 OK` with body `OK`

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

async fn health() -> &'static str {
    "OK"
}

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Bind `addr` and serve the liveness endpoint in a background task
///
/// Binding happens before this returns so an unusable address is a
/// startup error rather than a silent background failure.
pub async fn spawn(addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {}", addr))?;
    let local_addr = listener.local_addr()?;

    info!("Health endpoint listening on http://{}/health", local_addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!("Health endpoint stopped: {}", e);
        }
    });

    Ok((local_addr, handle))
}

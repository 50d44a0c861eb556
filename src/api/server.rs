//! HTTP transport for the manager surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::routes::router;
use crate::state::AppState;
use crate::{AppError, Result};

/// Bind `config.http_port` on localhost and serve until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind or crashes.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([127, 0, 0, 1], state.config.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve_listener(listener, state, ct).await
}

/// Serve the manager router on an already-bound listener.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "starting HTTP manager surface");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP manager surface shut down");
    Ok(())
}

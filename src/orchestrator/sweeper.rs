//! Background liveness sweep — reaps sessions whose worker crashed.
//!
//! `SessionManager::list` already sweeps opportunistically. This task runs
//! the same sweep on a fixed interval so crashed workers release their
//! ports even when nobody is listing sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::session_manager::SessionManager;

/// Spawn a task that sweeps every `interval` until `cancel` fires.
#[must_use]
pub fn spawn_sweeper(
    sessions: Arc<SessionManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "liveness sweeper started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("liveness sweeper shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            let reaped = sessions.sweep().await;
            if !reaped.is_empty() {
                info!(count = reaped.len(), "sweeper reaped dead sessions");
            }
        }
    })
}

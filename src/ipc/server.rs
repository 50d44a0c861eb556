//! Control socket: [`ControlRequest`] lines in, [`ControlResponse`] lines out.
//!
//! Runs on a named pipe (Windows) or Unix domain socket via `interprocess`.
//! Every request carries the broker's token; the operations themselves are
//! the shared [`crate::control`] command set.

use std::sync::Arc;

use interprocess::local_socket::tokio::{Listener, Stream};
use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::control::{execute, ControlRequest, ControlResponse};
use crate::state::AppState;
use crate::{AppError, Result};

/// Bound, not yet serving, control socket.
pub struct ControlSocket {
    listener: Listener,
    name: String,
}

impl std::fmt::Debug for ControlSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlSocket")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ControlSocket {
    /// Bind the socket named `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the name is invalid or already bound.
    pub fn bind(name: &str) -> Result<Self> {
        let ns_name = name
            .to_ns_name::<GenericNamespaced>()
            .map_err(|err| AppError::Ipc(format!("invalid socket name '{name}': {err}")))?;
        let listener = ListenerOptions::new()
            .name(ns_name)
            .create_tokio()
            .map_err(|err| AppError::Ipc(format!("cannot bind '{name}': {err}")))?;

        info!(ipc_name = name, "control socket bound");
        Ok(Self {
            listener,
            name: name.to_owned(),
        })
    }

    /// Accept clients until `cancel` fires; each client gets its own task.
    #[must_use]
    pub fn spawn(self, state: Arc<AppState>, cancel: CancellationToken) -> JoinHandle<()> {
        let span = info_span!("control_socket", ipc_name = %self.name);
        tokio::spawn(
            async move {
                loop {
                    let stream = tokio::select! {
                        () = cancel.cancelled() => break,
                        accepted = self.listener.accept() => accepted,
                    };
                    match stream {
                        Ok(stream) => {
                            let state = Arc::clone(&state);
                            tokio::spawn(
                                async move {
                                    if let Err(err) = serve_client(stream, &state).await {
                                        warn!(%err, "control client dropped");
                                    }
                                }
                                .in_current_span(),
                            );
                        }
                        Err(err) => warn!(%err, "control accept failed"),
                    }
                }
                info!("control socket closed");
            }
            .instrument(span),
        )
    }
}

async fn serve_client(stream: Stream, state: &AppState) -> Result<()> {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(state, &line).await;
        let mut encoded = serde_json::to_vec(&response)
            .map_err(|err| AppError::Ipc(format!("failed to encode response: {err}")))?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
    }

    debug!("control client disconnected");
    Ok(())
}

/// Answer one request line.
pub async fn respond(state: &AppState, line: &str) -> ControlResponse {
    let outcome = match serde_json::from_str::<ControlRequest>(line) {
        Ok(ControlRequest {
            auth_token,
            command,
        }) => match authorize(state.ipc_auth_token.as_deref(), auth_token.as_deref()) {
            Ok(()) => execute(state, command).await,
            Err(err) => Err(err),
        },
        Err(err) => Err(AppError::InvalidInput(format!("malformed request: {err}"))),
    };
    ControlResponse::from(outcome)
}

/// Accept the request when no token is configured or the tokens match.
///
/// # Errors
///
/// Returns `AppError::Ipc` on a missing or wrong token.
pub fn authorize(expected: Option<&str>, provided: Option<&str>) -> Result<()> {
    match (expected, provided) {
        (None, _) => Ok(()),
        (Some(expected), Some(provided)) if expected == provided => Ok(()),
        (Some(_), _) => {
            warn!("control request rejected: bad auth token");
            Err(AppError::Ipc("unauthorized".into()))
        }
    }
}

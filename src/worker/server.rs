//! REP endpoint serving one [`WorkerState`].
//!
//! The worker is single-threaded with respect to its state: it receives a
//! request, dispatches it to completion and sends exactly one reply before
//! accepting the next request.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeromq::{RepSocket, Socket, SocketRecv, SocketSend, ZmqError};

use super::commands::WorkerState;
use crate::protocol::{self, WorkerReply};
use crate::{AppError, Result};

/// Bound worker endpoint.
pub struct WorkerServer {
    socket: RepSocket,
    state: WorkerState,
    endpoint: String,
}

impl std::fmt::Debug for WorkerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerServer")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl WorkerServer {
    /// Bind a REP socket on `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the port cannot be bound.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let endpoint = protocol::endpoint(host, port);
        let mut socket = RepSocket::new();
        socket
            .bind(&endpoint)
            .await
            .map_err(|err| AppError::Io(format!("failed to bind {endpoint}: {err}")))?;

        info!(%endpoint, "worker listening");
        Ok(Self {
            socket,
            state: WorkerState::new(port),
            endpoint,
        })
    }

    /// Serve requests until `cancel` fires or the socket closes.
    ///
    /// A requester that vanishes before its reply is sent (for example
    /// after a proxy timeout) only costs that reply; the worker keeps its
    /// state and accepts the next request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if a reply cannot be encoded.
    pub async fn serve(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => {
                    info!(endpoint = %self.endpoint, "worker shutting down");
                    break;
                }
                received = self.socket.recv() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(ZmqError::NoMessage) => {
                    warn!(endpoint = %self.endpoint, "worker socket closed");
                    break;
                }
                Err(err) => {
                    warn!(%err, "recv failed, waiting for next request");
                    continue;
                }
            };

            let reply = match message.get(0) {
                Some(payload) => self.state.handle(payload).await,
                None => {
                    warn!("received empty message");
                    WorkerReply::failure("empty request")
                }
            };

            if let Err(err) = self.socket.send(protocol::encode(&reply)?).await {
                warn!(%err, "reply not delivered, requester gone");
            }
        }

        let errors = self.socket.close().await;
        if !errors.is_empty() {
            warn!(count = errors.len(), "errors while closing worker socket");
        }
        Ok(())
    }
}

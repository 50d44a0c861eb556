//! Command proxy — relays application commands to a session's worker.
//!
//! Each call opens a fresh ZeroMQ REQ socket, so concurrent calls for the
//! same session never interleave on one connection. Payloads are passed
//! through untouched; a worker-reported failure (`"success": false`) is a
//! normal reply, not a proxy error. Nothing is retried.
//!
//! A ZeroMQ connect retries refused connections indefinitely, so every
//! exchange first opens a plain TCP connection to the worker port and
//! fails fast when nobody is listening.

use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tracing::{debug, info_span, Instrument};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend};

use crate::config::ProxyConfig;
use crate::orchestrator::session_manager::SessionManager;
use crate::protocol::{self, WORKER_HOST};
use crate::{AppError, Result};

/// Upper bound on establishing the connection, independent of the reply timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Stateless request/reply relay.
#[derive(Debug, Clone)]
pub struct CommandProxy {
    host: String,
    timeout: Option<Duration>,
}

impl Default for CommandProxy {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

impl CommandProxy {
    /// Proxy with an optional per-request timeout.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            host: WORKER_HOST.to_owned(),
            timeout,
        }
    }

    /// Proxy configured from the `[proxy]` section.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.timeout())
    }

    /// Forward `command` to the worker of a running session.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is absent or not running.
    /// - `AppError::WorkerUnreachable` on connection failure or timeout.
    /// - `AppError::Protocol` if the reply is not a JSON document.
    pub async fn send(
        &self,
        sessions: &SessionManager,
        session_id: &str,
        command: &Value,
    ) -> Result<Value> {
        let port = sessions.route(session_id)?;

        let span = info_span!("proxy_send", session_id, port);
        self.send_to_port(port, command).instrument(span).await
    }

    /// Forward `command` to the worker listening on `port`.
    ///
    /// # Errors
    ///
    /// Same as [`CommandProxy::send`], minus the session lookup.
    pub async fn send_to_port(&self, port: u16, command: &Value) -> Result<Value> {
        let endpoint = protocol::endpoint(&self.host, port);
        ensure_listening(&self.host, port, &endpoint).await?;
        let exchange = exchange(&endpoint, command);

        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange).await.map_err(|_| {
                AppError::WorkerUnreachable(format!(
                    "no reply from {endpoint} within {limit:?}"
                ))
            })??,
            None => exchange.await?,
        };

        debug!(%endpoint, "worker replied");
        Ok(reply)
    }
}

/// Fail with `WorkerUnreachable` unless something accepts TCP connections
/// on `host:port`.
async fn ensure_listening(host: &str, port: u16, endpoint: &str) -> Result<()> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(err)) => Err(AppError::WorkerUnreachable(format!(
            "connect {endpoint}: {err}"
        ))),
        Err(_) => Err(AppError::WorkerUnreachable(format!(
            "connect {endpoint}: no answer within {CONNECT_TIMEOUT:?}"
        ))),
    }
}

/// One strict request/reply exchange on a fresh REQ socket.
async fn exchange(endpoint: &str, command: &Value) -> Result<Value> {
    let request = protocol::encode(command)?;

    let mut socket = ReqSocket::new();
    tokio::time::timeout(CONNECT_TIMEOUT, socket.connect(endpoint))
        .await
        .map_err(|_| {
            AppError::WorkerUnreachable(format!(
                "connect {endpoint}: no handshake within {CONNECT_TIMEOUT:?}"
            ))
        })?
        .map_err(|err| AppError::WorkerUnreachable(format!("connect {endpoint}: {err}")))?;
    socket
        .send(request)
        .await
        .map_err(|err| AppError::WorkerUnreachable(format!("send to {endpoint}: {err}")))?;
    let message = socket
        .recv()
        .await
        .map_err(|err| AppError::WorkerUnreachable(format!("recv from {endpoint}: {err}")))?;

    let errors = socket.close().await;
    if !errors.is_empty() {
        debug!(%endpoint, count = errors.len(), "errors while closing request socket");
    }

    protocol::decode(&message)
}

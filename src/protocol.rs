//! Worker wire protocol.
//!
//! Strict request/reply over a ZeroMQ REQ/REP pair with one JSON document
//! per message. The broker never interprets payloads; these types exist
//! for the reference worker and for tests.
//!
//! ```json
//! {"cmd": "status"}
//! {"cmd": "set_value", "params": {"name": "incl@binary", "value": 87.5}}
//! ```
//!
//! ```json
//! {"success": true, "result": {"port": 5000}}
//! {"success": false, "error": "Unknown command: fly", "available_commands": ["ping", "status"]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeromq::ZmqMessage;

use crate::{AppError, Result};

/// Host workers bind to and the proxy connects to.
pub const WORKER_HOST: &str = "127.0.0.1";

/// ZeroMQ TCP endpoint for a worker port.
#[must_use]
pub fn endpoint(host: &str, port: u16) -> String {
    format!("tcp://{host}:{port}")
}

/// Command sent to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRequest {
    /// Command name.
    pub cmd: String,
    /// Command arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl WorkerRequest {
    /// Request without parameters.
    #[must_use]
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            params: None,
        }
    }

    /// Request with parameters.
    #[must_use]
    pub fn with_params(cmd: impl Into<String>, params: Value) -> Self {
        Self {
            cmd: cmd.into(),
            params: Some(params),
        }
    }
}

/// Reply returned by a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerReply {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Worker-side traceback, passed through for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// Registered command names, sent with unknown-command failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_commands: Option<Vec<String>>,
}

impl WorkerReply {
    /// Successful reply carrying `result`.
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            traceback: None,
            available_commands: None,
        }
    }

    /// Failed reply with a message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            traceback: None,
            available_commands: None,
        }
    }

    /// Failed reply for a command name the worker does not register.
    #[must_use]
    pub fn unknown_command(name: &str, available: &[&str]) -> Self {
        Self {
            available_commands: Some(available.iter().map(|&cmd| cmd.to_owned()).collect()),
            ..Self::failure(format!("Unknown command: {name}"))
        }
    }
}

/// Encode a JSON document as a single-frame message.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<ZmqMessage> {
    let bytes = serde_json::to_vec(value)
        .map_err(|err| AppError::Protocol(format!("failed to encode message: {err}")))?;
    Ok(ZmqMessage::from(bytes))
}

/// Decode a single-frame message into a JSON document.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the message has more than one frame or
/// its payload is not JSON.
pub fn decode(message: &ZmqMessage) -> Result<Value> {
    if message.len() != 1 {
        return Err(AppError::Protocol(format!(
            "expected one frame, got {}",
            message.len()
        )));
    }
    let frame = message
        .get(0)
        .ok_or_else(|| AppError::Protocol("empty message".into()))?;
    serde_json::from_slice(frame)
        .map_err(|err| AppError::Protocol(format!("malformed reply: {err}")))
}

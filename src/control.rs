//! Broker operations as one typed command set.
//!
//! The HTTP routes and the local control socket both translate their input
//! into a [`ControlCommand`] and run it through [`execute`], so each front
//! end only owns its transport and the two can never drift apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::models::port::PortStatus;
use crate::models::session::{bytes_to_mb, LaunchedSession, SessionInfo};
use crate::state::AppState;
use crate::{AppError, Result};

/// One broker operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Every live session, after reaping dead workers.
    List,
    /// Launch a session.
    Start,
    /// Shut a session down; unknown ids report `success: false`.
    End {
        /// Target session.
        session_id: String,
    },
    /// One session's metadata.
    Info {
        /// Target session.
        session_id: String,
    },
    /// Set the session's display name.
    UserInfo {
        /// Target session.
        session_id: String,
        /// Given name.
        #[serde(default)]
        first_name: String,
        /// Family name.
        #[serde(default)]
        last_name: String,
    },
    /// Resident memory of one session's worker.
    Memory {
        /// Target session.
        session_id: String,
    },
    /// Resident memory of every live worker.
    MemoryAll,
    /// Port pool snapshot.
    Ports,
    /// Relay a command document to the session's worker.
    Send {
        /// Target session.
        session_id: String,
        /// Opaque worker command.
        payload: Value,
    },
}

/// Outcome flag with an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Whether the operation took effect.
    pub success: bool,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Memory reading for one session, in MB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Resident memory in MB.
    pub mem_used: f64,
}

/// Result payload of a [`ControlCommand`], serialized without a wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlOutcome {
    /// Sessions keyed by id.
    Sessions(BTreeMap<String, SessionInfo>),
    /// A newly launched session.
    Launched(LaunchedSession),
    /// One session.
    Session(SessionInfo),
    /// Success flag.
    Status(StatusMessage),
    /// One memory reading.
    Memory(MemoryUsage),
    /// Memory readings keyed by session id.
    MemoryAll(BTreeMap<String, f64>),
    /// Port pool snapshot.
    Ports(PortStatus),
    /// Worker reply, untouched.
    Reply(Value),
}

/// Run `command` against the broker.
///
/// # Errors
///
/// Propagates the session manager and proxy errors: `NotFound`,
/// `InvalidInput`, `ResourceExhausted`, `Spawn`, `WorkerUnreachable` and
/// `Protocol`.
pub async fn execute(state: &AppState, command: ControlCommand) -> Result<ControlOutcome> {
    let sessions = &state.sessions;
    let outcome = match command {
        ControlCommand::List => ControlOutcome::Sessions(sessions.list().await),
        ControlCommand::Start => ControlOutcome::Launched(sessions.launch()?),
        ControlCommand::End { session_id } => ControlOutcome::Status(StatusMessage {
            success: sessions.shutdown(&session_id).await,
            message: None,
        }),
        ControlCommand::Info { session_id } => ControlOutcome::Session(sessions.get(&session_id)?),
        ControlCommand::UserInfo {
            session_id,
            first_name,
            last_name,
        } => {
            sessions.update_user_info(&session_id, &first_name, &last_name)?;
            ControlOutcome::Status(StatusMessage {
                success: true,
                message: Some("user info updated".into()),
            })
        }
        ControlCommand::Memory { session_id } => {
            let bytes = sessions.memory_of(&session_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("memory of session {session_id} is not available"))
            })?;
            ControlOutcome::Memory(MemoryUsage {
                mem_used: bytes_to_mb(bytes),
            })
        }
        ControlCommand::MemoryAll => {
            let mut usage = BTreeMap::new();
            for session_id in sessions.list().await.into_keys() {
                if let Ok(Some(bytes)) = sessions.memory_of(&session_id).await {
                    usage.insert(session_id, bytes_to_mb(bytes));
                }
            }
            ControlOutcome::MemoryAll(usage)
        }
        ControlCommand::Ports => ControlOutcome::Ports(sessions.port_status()),
        ControlCommand::Send {
            session_id,
            payload,
        } => {
            let reply = state.proxy.send(sessions, &session_id, &payload).await?;
            info!(session_id, "command relayed");
            ControlOutcome::Reply(reply)
        }
    };
    Ok(outcome)
}

/// Control-socket request: a command plus the shared secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Secret printed to the broker's token file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// The operation.
    #[serde(flatten)]
    pub command: ControlCommand,
}

/// Control-socket response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Outcome on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<ControlOutcome>> for ControlResponse {
    fn from(result: Result<ControlOutcome>) -> Self {
        match result.and_then(|outcome| {
            serde_json::to_value(outcome)
                .map_err(|err| AppError::Protocol(format!("failed to encode outcome: {err}")))
        }) {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }
}

//! Session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Display name assigned to a session until a user identifies themselves.
pub const NOT_LOGGED_IN: &str = "Not logged in";

/// Lifecycle state for a session.
///
/// Sessions move strictly forward: `Creating -> Running -> Terminating ->
/// Terminated`. Only `Running` sessions receive proxied traffic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Port reserved and worker starting; not yet visible to callers.
    Creating,
    /// Worker running and registered.
    Running,
    /// Shutdown in progress.
    Terminating,
    /// Worker stopped and port released.
    Terminated,
}

impl SessionState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Creating, Self::Running)
                | (Self::Running, Self::Terminating)
                | (Self::Terminating, Self::Terminated)
        )
    }
}

/// Generate a fresh 128-bit random session identifier.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serializable view of a session, without its process handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionInfo {
    /// Opaque external handle.
    pub session_id: String,
    /// Port the worker listens on.
    pub port: u16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last observed resident memory of the worker; stale between queries.
    pub memory_bytes: Option<u64>,
    /// Human-readable label for the session's user.
    pub user_display_name: String,
    /// Current lifecycle state.
    pub state: SessionState,
}

/// Result of a successful launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchedSession {
    /// Identifier of the new session.
    pub session_id: String,
    /// Port reserved for its worker.
    pub port: u16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Initial display name, always [`NOT_LOGGED_IN`].
    pub user_display_name: String,
}

impl From<&SessionInfo> for LaunchedSession {
    fn from(info: &SessionInfo) -> Self {
        Self {
            session_id: info.session_id.clone(),
            port: info.port,
            created_at: info.created_at,
            user_display_name: info.user_display_name.clone(),
        }
    }
}

/// Build a display name from first and last names.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if either name is empty after trimming.
pub fn display_name(first_name: &str, last_name: &str) -> Result<String> {
    let first = first_name.trim();
    let last = last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(AppError::InvalidInput(
            "first and last name must both be provided".into(),
        ));
    }
    Ok(format!("{first} {last}"))
}

/// Convert a byte count to mebibytes for reporting.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

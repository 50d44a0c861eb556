//! Error types shared across the broker.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all broker failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure; fatal at start-up.
    Config(String),
    /// Every port in the pool is reserved.
    ResourceExhausted(String),
    /// The worker process could not be started.
    Spawn(String),
    /// A session identifier collided with a live record.
    DuplicateId(String),
    /// Requested session does not exist.
    NotFound(String),
    /// Caller-supplied input failed validation.
    InvalidInput(String),
    /// The worker could not be reached (refused, reset, or timed out).
    WorkerUnreachable(String),
    /// The worker replied with something that is not a JSON message.
    Protocol(String),
    /// Local control socket failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::DuplicateId(msg) => write!(f, "duplicate id: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::WorkerUnreachable(msg) => write!(f, "worker unreachable: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

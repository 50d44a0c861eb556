//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Port range handed out to worker processes, `[start, end)`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PortPoolConfig {
    /// First candidate port (inclusive).
    pub start: u16,
    /// One past the last candidate port (exclusive).
    pub end: u16,
}

/// How worker processes are launched and stopped.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Worker executable. The allocated port is appended as the last argument.
    pub command: String,
    /// Arguments passed before the port.
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds to wait after a graceful stop request before force-killing.
    #[serde(default = "default_grace_period_seconds")]
    pub grace_period_seconds: u64,
}

impl WorkerConfig {
    /// Grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }
}

/// Command proxy settings.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProxyConfig {
    /// Per-request timeout; 0 means wait indefinitely.
    #[serde(default = "default_proxy_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ProxyConfig {
    /// Request timeout, or `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_proxy_timeout_seconds(),
        }
    }
}

fn default_grace_period_seconds() -> u64 {
    5
}

fn default_proxy_timeout_seconds() -> u64 {
    30
}

fn default_http_port() -> u16 {
    8001
}

fn default_ipc_name() -> String {
    "session-broker".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port for the manager surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Named pipe / Unix socket identifier for the control socket.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Background liveness sweep interval; 0 disables the task.
    #[serde(default)]
    pub sweep_interval_seconds: u64,
    /// Candidate worker ports.
    pub port_pool: PortPoolConfig,
    /// Worker launch settings.
    pub worker: WorkerConfig,
    /// Command proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Background sweep interval, or `None` when disabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    fn validate(&self) -> Result<()> {
        let PortPoolConfig { start, end } = self.port_pool;
        if start == 0 {
            return Err(AppError::Config("port_pool.start must be non-zero".into()));
        }
        if start >= end {
            return Err(AppError::Config(format!(
                "port_pool range [{start}, {end}) is empty"
            )));
        }

        if self.worker.command.trim().is_empty() {
            return Err(AppError::Config("worker.command must not be empty".into()));
        }

        Ok(())
    }
}

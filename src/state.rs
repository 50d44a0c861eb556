//! Shared application state handed to the HTTP and IPC front ends.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::orchestrator::session_manager::SessionManager;
use crate::proxy::CommandProxy;
use crate::Result;

/// Everything a request handler needs.
#[derive(Debug)]
pub struct AppState {
    /// Validated configuration.
    pub config: Arc<GlobalConfig>,
    /// Session lifecycle owner.
    pub sessions: Arc<SessionManager>,
    /// Relay to worker processes.
    pub proxy: CommandProxy,
    /// Shared secret required on control-socket requests, when set.
    pub ipc_auth_token: Option<String>,
}

impl AppState {
    /// Build state with an empty registry from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the port range is invalid.
    pub fn from_config(config: GlobalConfig) -> Result<Self> {
        let sessions = Arc::new(SessionManager::from_config(&config)?);
        let proxy = CommandProxy::from_config(&config.proxy);
        Ok(Self {
            config: Arc::new(config),
            sessions,
            proxy,
            ipc_auth_token: None,
        })
    }
}

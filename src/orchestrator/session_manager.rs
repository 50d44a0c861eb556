//! Session lifecycle orchestration: launch, shutdown, sweep.
//!
//! Composes the [`PortPool`], [`Supervisor`] and [`SessionRegistry`]. A
//! launch reserves a port, spawns a worker and registers the session; any
//! failure unwinds the earlier steps so no partial session is ever visible.
//! Shutdown reverses the same steps.

use std::collections::BTreeMap;

use tracing::{debug, info, info_span, warn, Instrument};

use super::port_pool::PortPool;
use super::registry::{SessionRecord, SessionRegistry};
use super::supervisor::Supervisor;
use crate::config::GlobalConfig;
use crate::models::port::PortStatus;
use crate::models::session::{
    display_name, new_session_id, LaunchedSession, SessionInfo, SessionState,
};
use crate::{AppError, Result};

/// Owner of all session state: port pool, worker processes and registry.
#[derive(Debug)]
pub struct SessionManager {
    ports: PortPool,
    supervisor: Supervisor,
    registry: SessionRegistry,
}

impl SessionManager {
    /// Assemble a manager from its parts.
    #[must_use]
    pub fn new(ports: PortPool, supervisor: Supervisor) -> Self {
        Self {
            ports,
            supervisor,
            registry: SessionRegistry::new(),
        }
    }

    /// Build a manager from the global configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the port range is invalid.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        let ports = PortPool::from_config(&config.port_pool)?;
        Ok(Self::new(ports, Supervisor::new(&config.worker)))
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Start a new session with its own worker process.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResourceExhausted` when no port is free, or
    /// `AppError::Spawn` when the worker cannot be started. The registry
    /// and port pool are left unchanged on failure.
    pub fn launch(&self) -> Result<LaunchedSession> {
        let session_id = new_session_id();
        let span = info_span!("launch_session", session_id = %session_id);
        let _guard = span.enter();

        let port = self.ports.acquire()?;

        let worker = match self.supervisor.spawn(port, &session_id) {
            Ok(worker) => worker,
            Err(err) => {
                warn!(port, %err, "worker spawn failed, releasing port");
                self.ports.release(port);
                return Err(err);
            }
        };

        let mut record = SessionRecord::new(session_id.clone(), worker);
        transition(&mut record, SessionState::Running);
        let launched = LaunchedSession::from(&record.info());

        if let Err(err) = self.registry.create(record) {
            warn!(port, %err, "session registration failed, releasing port");
            self.ports.release(port);
            return Err(err);
        }

        info!(port, "session launched");
        Ok(launched)
    }

    /// Stop a session's worker and release its port.
    ///
    /// Returns `false` without error when the session does not exist, so
    /// repeated calls are harmless.
    pub async fn shutdown(&self, session_id: &str) -> bool {
        let Some(record) = self.registry.take(session_id) else {
            return false;
        };

        let span = info_span!("shutdown_session", session_id, port = record.port);
        self.finish(record).instrument(span).await;
        info!(session_id, "session shut down");
        true
    }

    /// Snapshot of every live session, after reaping dead workers.
    ///
    /// This call mutates state: sessions whose worker has exited are
    /// removed and their ports released before the snapshot is taken.
    pub async fn list(&self) -> BTreeMap<String, SessionInfo> {
        self.sweep().await;
        self.registry.list()
    }

    /// Snapshot of one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session is absent.
    pub fn get(&self, session_id: &str) -> Result<SessionInfo> {
        self.registry.get(session_id)
    }

    /// Query and cache a session's resident memory.
    ///
    /// Returns `Ok(None)` when the worker has already exited.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session is absent.
    pub async fn memory_of(&self, session_id: &str) -> Result<Option<u64>> {
        let pid = self
            .registry
            .live_pid(session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))?;

        let Some(pid) = pid else {
            return Ok(None);
        };
        let bytes = Supervisor::resident_memory(pid).await;
        if let Some(bytes) = bytes {
            self.registry.update_memory(session_id, bytes);
        }
        Ok(bytes)
    }

    /// Set the session's display name from first and last names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if either name is blank, or
    /// `AppError::NotFound` if the session is absent.
    pub fn update_user_info(&self, session_id: &str, first_name: &str, last_name: &str) -> Result<()> {
        let name = display_name(first_name, last_name)?;
        if self.registry.update_user_info(session_id, name) {
            info!(session_id, "user info updated");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("session {session_id} not found")))
        }
    }

    /// Port for routing commands to a running session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` unless the session is `Running`.
    pub fn route(&self, session_id: &str) -> Result<u16> {
        self.registry
            .running_port(session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))
    }

    /// Port pool snapshot.
    #[must_use]
    pub fn port_status(&self) -> PortStatus {
        self.ports.status()
    }

    /// Remove sessions whose worker has died and release their ports.
    ///
    /// Returns the ids of the reaped sessions.
    pub async fn sweep(&self) -> Vec<String> {
        let dead = self.registry.take_dead();
        let mut reaped = Vec::with_capacity(dead.len());
        for record in dead {
            warn!(
                session_id = %record.session_id,
                port = record.port,
                exit = ?record.worker.exit_status(),
                "worker exited without shutdown, reaping session"
            );
            reaped.push(record.session_id.clone());
            self.finish(record).await;
        }
        reaped
    }

    /// Shut down every live session.
    pub async fn shutdown_all(&self) -> usize {
        let records = self.registry.drain();
        let count = records.len();
        for record in records {
            self.finish(record).await;
        }
        info!(count, "all sessions shut down");
        count
    }

    /// Stop the worker of a record already removed from the registry and
    /// release its port.
    async fn finish(&self, record: SessionRecord) {
        let SessionRecord {
            session_id,
            port,
            state,
            worker,
            ..
        } = record;
        debug_assert!(state.can_transition_to(SessionState::Terminated));

        self.supervisor.terminate(worker).await;
        self.ports.release(port);
        debug!(session_id, port, state = ?SessionState::Terminated, "session finished");
    }
}

fn transition(record: &mut SessionRecord, next: SessionState) {
    debug_assert!(
        record.state.can_transition_to(next),
        "invalid session transition {:?} -> {next:?}",
        record.state
    );
    record.state = next;
}

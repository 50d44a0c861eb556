//! Session registry — the authoritative in-memory map of live sessions.
//!
//! Pure keyed storage with no I/O. Reads take a shared lock and return
//! owned snapshots, so callers never observe a half-updated record.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::supervisor::{Supervisor, WorkerHandle};
use crate::models::session::{SessionInfo, SessionState, NOT_LOGGED_IN};
use crate::{AppError, Result};

/// A registered session together with its exclusively owned worker.
#[derive(Debug)]
pub struct SessionRecord {
    /// Opaque external handle.
    pub session_id: String,
    /// Port reserved for the worker.
    pub port: u16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last observed resident memory.
    pub memory_bytes: Option<u64>,
    /// Human-readable label for the session's user.
    pub user_display_name: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// The worker process; only the registry's owner may stop it.
    pub worker: WorkerHandle,
}

impl SessionRecord {
    /// New record in the `Creating` state with the default display name.
    #[must_use]
    pub fn new(session_id: String, worker: WorkerHandle) -> Self {
        Self {
            session_id,
            port: worker.port(),
            created_at: Utc::now(),
            memory_bytes: None,
            user_display_name: NOT_LOGGED_IN.to_owned(),
            state: SessionState::Creating,
            worker,
        }
    }

    /// Serializable snapshot without the process handle.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            port: self.port,
            created_at: self.created_at,
            memory_bytes: self.memory_bytes,
            user_display_name: self.user_display_name.clone(),
            state: self.state,
        }
    }
}

/// Thread-safe session store keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record.
    ///
    /// A rejected record is dropped, which kills its worker.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DuplicateId` if the id is already registered.
    pub fn create(&self, record: SessionRecord) -> Result<()> {
        let mut records = self.write();
        if records.contains_key(&record.session_id) {
            return Err(AppError::DuplicateId(format!(
                "session {} already registered",
                record.session_id
            )));
        }
        records.insert(record.session_id.clone(), record);
        Ok(())
    }

    /// Snapshot of one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session is absent.
    pub fn get(&self, session_id: &str) -> Result<SessionInfo> {
        self.read()
            .get(session_id)
            .map(SessionRecord::info)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))
    }

    /// Port of a session that is `Running`, the only state that accepts traffic.
    #[must_use]
    pub fn running_port(&self, session_id: &str) -> Option<u16> {
        self.read()
            .get(session_id)
            .filter(|record| record.state == SessionState::Running)
            .map(|record| record.port)
    }

    /// Replace the display name. Returns `false` if the session is absent.
    pub fn update_user_info(&self, session_id: &str, display_name: String) -> bool {
        match self.write().get_mut(session_id) {
            Some(record) => {
                record.user_display_name = display_name;
                true
            }
            None => false,
        }
    }

    /// Cache an observed memory reading. No-op if the session is absent.
    pub fn update_memory(&self, session_id: &str, bytes: u64) {
        if let Some(record) = self.write().get_mut(session_id) {
            record.memory_bytes = Some(bytes);
        }
    }

    /// Pid of the session's worker if it is still running.
    ///
    /// Outer `None` means the session is absent.
    #[must_use]
    pub fn live_pid(&self, session_id: &str) -> Option<Option<u32>> {
        self.write()
            .get_mut(session_id)
            .map(|record| Supervisor::live_pid(&mut record.worker))
    }

    /// Remove a record. Returns `false` if it was absent.
    pub fn remove(&self, session_id: &str) -> bool {
        self.take(session_id).is_some()
    }

    /// Remove and return a record, marking it `Terminating`.
    pub fn take(&self, session_id: &str) -> Option<SessionRecord> {
        let mut record = self.write().remove(session_id)?;
        record.state = SessionState::Terminating;
        Some(record)
    }

    /// Remove every record whose worker has exited, marking each `Terminating`.
    pub fn take_dead(&self) -> Vec<SessionRecord> {
        let mut records = self.write();
        let dead: Vec<String> = records
            .iter_mut()
            .filter_map(|(id, record)| {
                (!Supervisor::is_alive(&mut record.worker)).then(|| id.clone())
            })
            .collect();

        dead.iter()
            .filter_map(|id| records.remove(id))
            .map(|mut record| {
                record.state = SessionState::Terminating;
                record
            })
            .collect()
    }

    /// Remove and return all records, marking each `Terminating`.
    pub fn drain(&self) -> Vec<SessionRecord> {
        self.write()
            .drain()
            .map(|(_, mut record)| {
                record.state = SessionState::Terminating;
                record
            })
            .collect()
    }

    /// Consistent snapshot of every session, ordered by id.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, SessionInfo> {
        self.read()
            .iter()
            .map(|(id, record)| (id.clone(), record.info()))
            .collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

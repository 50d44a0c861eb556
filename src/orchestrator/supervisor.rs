//! Worker process supervisor.
//!
//! Spawns one external worker per session with `kill_on_drop(true)`, answers
//! liveness and memory queries, and stops workers with a graceful request
//! followed by a forced kill once the grace period expires. Every operation
//! tolerates a handle whose process has already exited.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::{AppError, Result};

/// Environment variable carrying the session id into the worker.
pub const SESSION_ID_ENV: &str = "SESSION_BROKER_SESSION_ID";

/// Environment variable carrying the allocated port into the worker.
pub const PORT_ENV: &str = "SESSION_BROKER_PORT";

/// Owned handle to a running worker process.
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
    pid: Option<u32>,
    port: u16,
    exit: Option<ExitStatus>,
}

impl WorkerHandle {
    /// OS process id recorded at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Port the worker was told to bind.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Exit status, once the process has been observed to exit.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }
}

/// Launches and stops worker processes according to [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct Supervisor {
    command: String,
    args: Vec<String>,
    grace_period: Duration,
}

impl Supervisor {
    /// Build a supervisor from the `[worker]` config section.
    #[must_use]
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            grace_period: config.grace_period(),
        }
    }

    /// Start a worker bound to `port`.
    ///
    /// Returns as soon as the OS has created the process; it does not wait
    /// for the worker's RPC endpoint to come up.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the process cannot be created.
    pub fn spawn(&self, port: u16, session_id: &str) -> Result<WorkerHandle> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(port.to_string())
            .env(SESSION_ID_ENV, session_id)
            .env(PORT_ENV, port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| {
            AppError::Spawn(format!("failed to spawn worker '{}': {err}", self.command))
        })?;
        let pid = child.id();

        info!(
            session_id,
            port,
            pid = pid.unwrap_or(0),
            command = %self.command,
            "worker process spawned"
        );

        Ok(WorkerHandle {
            child,
            pid,
            port,
            exit: None,
        })
    }

    /// Non-blocking liveness check.
    ///
    /// A failed status poll counts as dead so the caller can clean up.
    pub fn is_alive(handle: &mut WorkerHandle) -> bool {
        if handle.exit.is_some() {
            return false;
        }
        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(port = handle.port, %status, "worker process has exited");
                handle.exit = Some(status);
                false
            }
            Err(err) => {
                warn!(port = handle.port, %err, "failed to poll worker process status");
                false
            }
        }
    }

    /// Pid of the worker if it is still running.
    pub fn live_pid(handle: &mut WorkerHandle) -> Option<u32> {
        if Self::is_alive(handle) {
            handle.pid
        } else {
            None
        }
    }

    /// Resident memory of the process, or `None` when it no longer exists.
    pub async fn resident_memory(pid: u32) -> Option<u64> {
        tokio::task::spawn_blocking(move || {
            let pid = Pid::from_u32(pid);
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            system.process(pid).map(sysinfo::Process::memory)
        })
        .await
        .unwrap_or_else(|err| {
            warn!(%err, "memory query task failed");
            None
        })
    }

    /// Stop a worker: request a graceful exit, wait up to the grace period,
    /// then force-kill. Already-exited workers are simply reaped.
    pub async fn terminate(&self, mut handle: WorkerHandle) {
        let port = handle.port;
        if !Self::is_alive(&mut handle) {
            info!(port, exit = ?handle.exit, "worker already exited");
            return;
        }

        request_stop(&mut handle);

        match tokio::time::timeout(self.grace_period, handle.child.wait()).await {
            Ok(Ok(status)) => {
                info!(port, %status, "worker process exited gracefully");
            }
            Ok(Err(err)) => {
                warn!(port, %err, "error waiting for worker process");
            }
            Err(_) => {
                warn!(
                    port,
                    grace = ?self.grace_period,
                    "worker did not exit within grace period, forcing kill"
                );
                if let Err(err) = handle.child.kill().await {
                    warn!(port, %err, "failed to force-kill worker process");
                }
            }
        }
    }
}

/// Ask the process to exit. On unix this is `SIGTERM`; elsewhere there is
/// no graceful signal, so the process is killed outright.
#[cfg(unix)]
fn request_stop(handle: &mut WorkerHandle) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid as UnixPid;

    let Some(raw) = handle.pid.and_then(|pid| i32::try_from(pid).ok()) else {
        if let Err(err) = handle.child.start_kill() {
            warn!(port = handle.port, %err, "failed to kill worker without pid");
        }
        return;
    };

    if let Err(err) = kill(UnixPid::from_raw(raw), Signal::SIGTERM) {
        warn!(port = handle.port, pid = raw, %err, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn request_stop(handle: &mut WorkerHandle) {
    if let Err(err) = handle.child.start_kill() {
        warn!(port = handle.port, %err, "failed to kill worker process");
    }
}

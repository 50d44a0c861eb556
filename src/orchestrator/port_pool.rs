//! Port pool — hands out worker ports from a configured range.
//!
//! The pool is a contiguous range `[start, end)` partitioned into reserved
//! and available ports. All mutation happens under a single mutex, so two
//! concurrent [`PortPool::acquire`] calls can never return the same port
//! and [`PortPool::status`] always reflects one consistent instant.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::PortPoolConfig;
use crate::models::port::PortStatus;
use crate::{AppError, Result};

/// Thread-safe allocator over a fixed port range.
#[derive(Debug)]
pub struct PortPool {
    range: Range<u16>,
    reserved: Mutex<BTreeSet<u16>>,
}

impl PortPool {
    /// Configure a pool over `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the range is empty or starts at zero.
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 || start >= end {
            return Err(AppError::Config(format!(
                "invalid port range [{start}, {end})"
            )));
        }
        Ok(Self {
            range: start..end,
            reserved: Mutex::new(BTreeSet::new()),
        })
    }

    /// Configure a pool from the `[port_pool]` config section.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the range is invalid.
    pub fn from_config(config: &PortPoolConfig) -> Result<Self> {
        Self::new(config.start, config.end)
    }

    /// Reserve the lowest free port.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResourceExhausted` when every port is reserved.
    pub fn acquire(&self) -> Result<u16> {
        let mut reserved = self.lock();
        let port = self
            .range
            .clone()
            .find(|port| !reserved.contains(port))
            .ok_or_else(|| {
                AppError::ResourceExhausted(format!(
                    "no available ports in pool [{}, {})",
                    self.range.start, self.range.end
                ))
            })?;
        reserved.insert(port);
        debug!(port, "port reserved");
        Ok(port)
    }

    /// Return a port to the pool. Releasing an unreserved port is a no-op.
    pub fn release(&self, port: u16) {
        if self.lock().remove(&port) {
            debug!(port, "port released");
        } else {
            warn!(port, "release of unreserved port ignored");
        }
    }

    /// Whether `port` is currently reserved.
    #[must_use]
    pub fn is_reserved(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    /// Consistent snapshot of reserved and available ports.
    #[must_use]
    pub fn status(&self) -> PortStatus {
        let reserved = self.lock();
        let total = self.range.len();
        PortStatus {
            total,
            reserved: reserved.len(),
            available: total - reserved.len(),
            reserved_list: reserved.iter().copied().collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u16>> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Port pool observability snapshot.

use serde::{Deserialize, Serialize};

/// Point-in-time view of the port pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PortStatus {
    /// Number of ports in the configured range.
    pub total: usize,
    /// Number of ports bound to live sessions.
    pub reserved: usize,
    /// Number of ports free for allocation.
    pub available: usize,
    /// Reserved ports in ascending order.
    pub reserved_list: Vec<u16>,
}

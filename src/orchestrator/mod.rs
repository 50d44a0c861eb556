//! Session orchestration modules.
//!
//! Covers port allocation, worker process supervision, the session
//! registry, lifecycle orchestration and the background liveness sweep.

pub mod port_pool;
pub mod registry;
pub mod session_manager;
pub mod supervisor;
pub mod sweeper;

#![forbid(unsafe_code)]

//! Session broker: one worker process per user session, allocated from a
//! managed TCP port pool, supervised for liveness and memory, and reached
//! through a request/reply command proxy.

pub mod api;
pub mod config;
pub mod control;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod proxy;
pub mod runtime;
pub mod state;
pub mod worker;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};

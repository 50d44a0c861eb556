//! Local control layer for `session-broker-ctl`.
//!
//! A named pipe (Windows) or Unix domain socket carrying the broker's
//! control commands, guarded by a token kept in an owner-only file.

pub mod server;
pub mod token;

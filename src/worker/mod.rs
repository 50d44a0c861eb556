//! Reference worker endpoint.
//!
//! One `session-worker` process serves one session: it binds a REP socket
//! on the port the broker allocated and executes commands against its own
//! parameter store, which no other process can touch.

pub mod commands;
pub mod server;

//! Domain model module declarations.

pub mod port;
pub mod session;

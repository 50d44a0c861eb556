//! Manager HTTP surface consumed by the dashboard and the GUI.

pub mod error;
pub mod routes;
pub mod server;

//! Runtime glue that wires configuration, telemetry, the HTTP server, and
//! runner orchestration.

pub mod config;
pub mod runner;
pub mod server;
pub mod telemetry;

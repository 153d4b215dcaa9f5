//! LoadProbe Server Library
//!
//! This module exports the probe session components for use in integration
//! tests and the `loadprobe` binary.

pub mod config;
pub mod log_sink;
pub mod probe;
pub mod routes;
pub mod session;
pub mod stress;

// Re-export commonly used types
pub use log_sink::{LogSink, LogSinkError};
pub use routes::{AppState, session_routes};
pub use session::{SessionError, SessionOrchestrator, SessionReport, SessionRequest};

//! Probe workers
//!
//! This module provides:
//! - `HttpProbe` for header-only HTTP probing of one target
//! - `RemoteExecProbe` and the `RemoteExecutor` trait for remote command probing
//! - `ProbeOutcome` and `LogLine`, the records written to the session log

pub mod http;
pub mod remote_exec;
mod types;

pub use http::HttpProbe;
pub use remote_exec::{KubectlExecutor, RemoteExecProbe, RemoteExecutor};
pub use types::{
    HostTag, HttpStatus, LogLine, ProbeOutcome, RemoteOp, RemoteTarget, TIMESTAMP_FORMAT,
};

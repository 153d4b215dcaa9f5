//! Probe outcomes and their serialized log line form

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used by the start and end markers
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which of the two configured targets a probe hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostTag {
    First,
    Second,
}

impl HostTag {
    pub fn as_u8(self) -> u8 {
        match self {
            HostTag::First => 1,
            HostTag::Second => 2,
        }
    }
}

impl fmt::Display for HostTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Classified result of one HTTP probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Code(u16),
    Timeout,
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpStatus::Code(code) => write!(f, "{}", code),
            HttpStatus::Timeout => f.write_str("TIMEOUT"),
        }
    }
}

/// The fixed operations run against a remote execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// Read a well-known system identification file
    Read,
    /// Unauthenticated outbound ICMP probe
    UnauthPing,
    /// Append a literal line to a writable path
    Write,
}

impl RemoteOp {
    /// Operations in the order they run within one tick
    pub const ALL: [RemoteOp; 3] = [RemoteOp::Read, RemoteOp::UnauthPing, RemoteOp::Write];

    /// Label used in log lines
    pub fn label(self) -> &'static str {
        match self {
            RemoteOp::Read => "read",
            RemoteOp::UnauthPing => "unauth-ping",
            RemoteOp::Write => "write",
        }
    }

    /// Command executed inside the target
    pub fn argv(self) -> &'static [&'static str] {
        match self {
            RemoteOp::Read => &["cat", "/etc/os-release"],
            RemoteOp::UnauthPing => &["ping", "-c", "2", "8.8.8.8"],
            RemoteOp::Write => &["sh", "-c", "echo 'test' >> /tmp/report.txt"],
        }
    }
}

/// Identity of a remote execution target (pod/namespace/optional container)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub pod: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// One recorded probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    HttpResult { host: HostTag, status: HttpStatus },
    HttpError { message: String },
    RemoteResult { op: RemoteOp, exit_code: i32 },
    RemoteError { op: RemoteOp, message: String },
}

impl ProbeOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeOutcome::HttpResult { .. } => "http-result",
            ProbeOutcome::HttpError { .. } => "http-error",
            ProbeOutcome::RemoteResult { op, .. } => match op {
                RemoteOp::Read => "k8s-read",
                RemoteOp::UnauthPing => "k8s-unauth-egress",
                RemoteOp::Write => "k8s-write",
            },
            ProbeOutcome::RemoteError { .. } => "k8s-error",
        }
    }
}

/// Collapse line breaks so a message never spans more than one log line
fn single_line(message: &str) -> String {
    message
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::HttpResult { host, status } => {
                write!(f, "[RESULT] host={} code={}", host, status)
            }
            ProbeOutcome::HttpError { message } => {
                write!(f, "[ERROR] curl failed: {}", single_line(message))
            }
            ProbeOutcome::RemoteResult { op, exit_code } => {
                write!(f, "[K8S_RESULT] type={} exit_code={}", op.label(), exit_code)
            }
            ProbeOutcome::RemoteError { op, message } => write!(
                f,
                "[K8S_ERROR] type={} error={}",
                op.label(),
                single_line(message)
            ),
        }
    }
}

/// A line of the session log
#[derive(Debug, Clone)]
pub enum LogLine {
    Start(DateTime<Local>),
    Outcome(ProbeOutcome),
    End(DateTime<Local>),
    Runtime(u64),
}

impl From<ProbeOutcome> for LogLine {
    fn from(outcome: ProbeOutcome) -> Self {
        LogLine::Outcome(outcome)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLine::Start(ts) => write!(f, "[START] {}", ts.format(TIMESTAMP_FORMAT)),
            LogLine::Outcome(outcome) => outcome.fmt(f),
            LogLine::End(ts) => write!(f, "[END] {}", ts.format(TIMESTAMP_FORMAT)),
            LogLine::Runtime(secs) => write!(f, "[RUNTIME] {} секунд", secs),
        }
    }
}

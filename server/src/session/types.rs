//! Session request, resolved parameters and errors

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::SessionSettings;
use crate::log_sink::LogSinkError;
use crate::probe::{HostTag, RemoteTarget};

/// Requests per second used when the request omits it or asks for less than 1
pub const DEFAULT_RPS: u64 = 50;
/// Session duration used when the request omits it
pub const DEFAULT_DURATION: &str = "1m";
/// Shortest pause between two HTTP probes of one worker
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// Invalid session input, detected before anything starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("Duration must be at least one second")]
    NonPositiveDuration,

    #[error("Duration exceeds the maximum of {max_secs} seconds")]
    DurationTooLong { max_secs: u64 },

    #[error("Invalid requests per second: {0:?}")]
    InvalidRps(String),

    #[error("Requests per second exceeds the maximum of {max}")]
    RpsTooHigh { max: u64 },
}

/// Session errors surfaced to the caller
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("A probe session is already running")]
    Busy,

    #[error("Session log error: {0}")]
    Log(#[from] LogSinkError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Session aborted: {0}")]
    Aborted(String),
}

/// Duration as sent by the client: a raw second count or a suffixed string.
/// Any other JSON value is kept so it can be rejected as a config error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Seconds(u64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for DurationSpec {
    fn default() -> Self {
        DurationSpec::Text(DEFAULT_DURATION.to_string())
    }
}

/// Requests per second as sent by the client: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpsSpec {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl RpsSpec {
    fn resolve(&self, max: u64) -> Result<u64, ConfigError> {
        let rps = match self {
            RpsSpec::Number(n) => *n,
            RpsSpec::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidRps(text.clone()))?,
            // Integers beyond i64 land here
            RpsSpec::Other(value) if value.as_u64().is_some() => {
                return Err(ConfigError::RpsTooHigh { max });
            }
            RpsSpec::Other(value) => return Err(ConfigError::InvalidRps(value.to_string())),
        };

        if rps < 1 {
            return Ok(DEFAULT_RPS.min(max.max(1)));
        }
        let rps = rps as u64;
        if rps > max {
            return Err(ConfigError::RpsTooHigh { max });
        }
        Ok(rps)
    }
}

/// Remote-exec identity as sent by the client; any part may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTargetRequest {
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
}

impl RemoteTargetRequest {
    /// A complete identity needs both pod and namespace
    pub fn resolve(&self) -> Option<RemoteTarget> {
        let pod = non_empty(self.pod.as_deref())?;
        let namespace = non_empty(self.namespace.as_deref())?;
        Some(RemoteTarget {
            pod: pod.to_string(),
            namespace: namespace.to_string(),
            component: non_empty(self.component.as_deref()).map(str::to_string),
        })
    }
}

/// Incoming session request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    #[serde(default, alias = "url1")]
    pub target_url_1: Option<String>,
    #[serde(default, alias = "url2")]
    pub target_url_2: Option<String>,
    #[serde(default, alias = "rps")]
    pub requests_per_second: Option<RpsSpec>,
    #[serde(default)]
    pub duration: DurationSpec,
    #[serde(default)]
    pub remote_exec_target: Option<RemoteTargetRequest>,
    /// Top-level `pod`/`namespace`/`component` sent by the legacy web UI,
    /// used when `remote_exec_target` is absent
    #[serde(flatten)]
    pub legacy_remote_target: RemoteTargetRequest,
}

/// Resolved, immutable parameters of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub targets: Vec<(HostTag, String)>,
    pub rps: u64,
    pub duration: Duration,
    pub probe_interval: Duration,
    pub workers_per_target: usize,
    pub remote_target: Option<RemoteTarget>,
}

impl SessionParams {
    pub fn resolve(
        request: &SessionRequest,
        settings: &SessionSettings,
    ) -> Result<Self, ConfigError> {
        let max_duration = settings.max_duration;
        let secs = match &request.duration {
            DurationSpec::Seconds(secs) => *secs,
            DurationSpec::Text(text) => parse_duration(text)?,
            DurationSpec::Other(value) => {
                return Err(ConfigError::InvalidDuration(value.to_string()));
            }
        };
        if secs == 0 {
            return Err(ConfigError::NonPositiveDuration);
        }
        if secs > max_duration.as_secs() {
            return Err(ConfigError::DurationTooLong {
                max_secs: max_duration.as_secs(),
            });
        }

        let rps = match request.requests_per_second {
            Some(ref rps) => rps.resolve(settings.max_rps)?,
            None => DEFAULT_RPS.min(settings.max_rps.max(1)),
        };

        let targets = [
            (HostTag::First, request.target_url_1.as_deref()),
            (HostTag::Second, request.target_url_2.as_deref()),
        ]
        .into_iter()
        .filter_map(|(host, url)| non_empty(url).map(|url| (host, url.to_string())))
        .collect();

        Ok(Self {
            targets,
            rps,
            duration: Duration::from_secs(secs),
            probe_interval: probe_interval(rps),
            workers_per_target: workers_per_target(rps),
            remote_target: request
                .remote_exec_target
                .as_ref()
                .unwrap_or(&request.legacy_remote_target)
                .resolve(),
        })
    }

    /// Total number of HTTP workers across all targets
    pub fn http_worker_count(&self) -> usize {
        self.targets.len() * self.workers_per_target
    }
}

/// Resolve `"45"`, `"2m"` or `"1h"` to seconds
pub fn parse_duration(raw: &str) -> Result<u64, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let (number, multiplier) = if let Some(n) = raw.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = raw.strip_suffix('h') {
        (n, 3600)
    } else {
        (raw, 1)
    };

    // u64::from_str accepts a leading '+'; only plain digits are valid here
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = number.parse().map_err(|_| invalid())?;
    value
        .checked_mul(multiplier)
        .ok_or(ConfigError::DurationTooLong { max_secs: u64::MAX })
}

/// Pause between two probes of one HTTP worker
pub fn probe_interval(rps: u64) -> Duration {
    let divisor = (rps / 10).max(1);
    Duration::from_nanos(1_000_000_000 / divisor).max(MIN_PROBE_INTERVAL)
}

/// HTTP workers spawned per configured target
pub fn workers_per_target(rps: u64) -> usize {
    (rps / 10 + 1) as usize
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Completion record returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub status: String,
    pub log_destination: String,
    pub runtime_seconds: u64,
    pub workers_spawned: usize,
    pub workers_abandoned: usize,
}

//! Server configuration
//!
//! Configuration is loaded from environment variables. Every value has a default,
//! so the server starts without any environment set.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Probe session configuration
    pub session: SessionSettings,

    /// Stress generator configuration
    pub stress: StressConfig,

    /// Static file serving configuration
    pub static_files: StaticFilesConfig,
}

/// Settings shared by every probe session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Log file truncated at the start of each session
    pub log_path: PathBuf,
    /// Client-side timeout of one HTTP probe request
    pub http_timeout: Duration,
    /// Timeout of one remote command execution
    pub remote_exec_timeout: Duration,
    /// Pause between two remote-exec ticks
    pub remote_exec_interval: Duration,
    /// Time each worker gets to exit after cancellation
    pub worker_grace_period: Duration,
    /// Longest session a request may ask for
    pub max_duration: Duration,
    /// Highest requests-per-second a request may ask for
    pub max_rps: u64,
    /// kubectl binary used for remote execution
    pub kubectl_path: String,
}

/// External stress generator configuration
#[derive(Debug, Clone, Default)]
pub struct StressConfig {
    /// Command line of the stress generator; `None` disables it
    pub command: Option<Vec<String>>,
}

/// Static file serving configuration (web UI)
#[derive(Debug, Clone, Default)]
pub struct StaticFilesConfig {
    /// Directory containing static files
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            session: SessionSettings::default(),
            stress: StressConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("logs/curl_monitor_latest.log"),
            http_timeout: Duration::from_secs(5),
            remote_exec_timeout: Duration::from_secs(10),
            remote_exec_interval: Duration::from_secs(30),
            worker_grace_period: Duration::from_secs(1),
            max_duration: Duration::from_secs(24 * 60 * 60), // 24 hours
            max_rps: 1000,
            kubectl_path: "kubectl".to_string(),
        }
    }
}

impl StressConfig {
    /// Split a whitespace-separated command line into program and arguments
    pub fn parse_command(raw: &str) -> Option<Vec<String>> {
        let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        if parts.is_empty() { None } else { Some(parts) }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Session config
        if let Ok(path) = env::var("LOG_PATH")
            && !path.is_empty()
        {
            config.session.log_path = PathBuf::from(path);
        }
        if let Ok(val) = env::var("HTTP_PROBE_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.http_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("REMOTE_EXEC_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.remote_exec_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("REMOTE_EXEC_INTERVAL_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.remote_exec_interval = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("WORKER_GRACE_PERIOD_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.session.worker_grace_period = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("MAX_SESSION_DURATION_HOURS")
            && let Ok(hours) = val.parse::<u64>()
        {
            config.session.max_duration = Duration::from_secs(hours * 60 * 60);
        }
        if let Ok(val) = env::var("MAX_RPS")
            && let Ok(rps) = val.parse::<u64>()
        {
            config.session.max_rps = rps;
        }
        if let Ok(path) = env::var("KUBECTL_PATH")
            && !path.is_empty()
        {
            config.session.kubectl_path = path;
        }

        // Stress config
        if let Ok(cmd) = env::var("STRESS_COMMAND") {
            config.stress.command = StressConfig::parse_command(&cmd);
        }

        // Static files
        if let Ok(dir) = env::var("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files.dir = Some(PathBuf::from(dir));
        }

        config
    }
}

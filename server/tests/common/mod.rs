//! Common Test Utilities for Integration Tests
//!
//! Local probe targets, scripted remote executors and log parsing helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, http::StatusCode, routing::any};
use loadprobe_server::config::SessionSettings;
use loadprobe_server::probe::{RemoteExecutor, RemoteTarget};
use loadprobe_server::stress::NoopStressDriver;
use loadprobe_server::{AppState, SessionOrchestrator, session_routes};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Start a local HTTP target that answers every request with `status`
pub async fn spawn_target(status: StatusCode) -> String {
    let router = Router::new()
        .route("/", any(move || async move { status }))
        .fallback(move || async move { status });
    let addr = serve(router).await;
    format!("http://{}/", addr)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Remote executor that answers every command with a fixed exit code
pub struct FixedExitExecutor {
    pub exit_code: i32,
    pub calls: AtomicUsize,
}

impl FixedExitExecutor {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExecutor for FixedExitExecutor {
    async fn exec(&self, _target: &RemoteTarget, _argv: &[&str]) -> std::io::Result<Option<i32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.exit_code))
    }
}

/// Remote executor whose commands never finish
pub struct HangingExecutor;

#[async_trait]
impl RemoteExecutor for HangingExecutor {
    async fn exec(&self, _target: &RemoteTarget, _argv: &[&str]) -> std::io::Result<Option<i32>> {
        std::future::pending::<()>().await;
        Ok(Some(0))
    }
}

/// Session settings writing into `dir`, with short timeouts for tests
pub fn test_settings(dir: &tempfile::TempDir) -> SessionSettings {
    SessionSettings {
        log_path: dir.path().join("logs").join("session.log"),
        http_timeout: Duration::from_secs(2),
        remote_exec_timeout: Duration::from_secs(2),
        remote_exec_interval: Duration::from_millis(100),
        worker_grace_period: Duration::from_millis(500),
        ..SessionSettings::default()
    }
}

pub fn create_orchestrator(
    settings: SessionSettings,
    executor: Arc<dyn RemoteExecutor>,
) -> SessionOrchestrator {
    SessionOrchestrator::new(settings, executor, Arc::new(NoopStressDriver))
}

/// Create a test application router with state
pub fn create_test_app(orchestrator: SessionOrchestrator) -> Router {
    session_routes(AppState::new(orchestrator))
}

pub fn read_lines(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Whether `line` matches one of the documented log line formats
pub fn is_well_formed(line: &str) -> bool {
    if let Some(ts) = line.strip_prefix("[START] ").or_else(|| line.strip_prefix("[END] ")) {
        return chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").is_ok();
    }
    if let Some(rest) = line.strip_prefix("[RUNTIME] ") {
        return rest
            .strip_suffix(" секунд")
            .is_some_and(|n| n.parse::<u64>().is_ok());
    }
    if let Some(rest) = line.strip_prefix("[RESULT] host=") {
        let Some((host, code)) = rest.split_once(" code=") else {
            return false;
        };
        return (host == "1" || host == "2")
            && (code == "TIMEOUT" || code.parse::<u16>().is_ok());
    }
    if line.starts_with("[ERROR] curl failed: ") {
        return true;
    }
    if let Some(rest) = line.strip_prefix("[K8S_RESULT] type=") {
        let Some((op, code)) = rest.split_once(" exit_code=") else {
            return false;
        };
        return ["read", "unauth-ping", "write"].contains(&op) && code.parse::<i32>().is_ok();
    }
    if let Some(rest) = line.strip_prefix("[K8S_ERROR] type=") {
        return ["read ", "unauth-ping ", "write "]
            .iter()
            .any(|op| rest.starts_with(op));
    }
    false
}

pub fn count_prefix(lines: &[String], prefix: &str) -> usize {
    lines.iter().filter(|l| l.starts_with(prefix)).count()
}

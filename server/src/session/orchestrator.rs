//! Probe session orchestrator
//!
//! Runs one session at a time: resolves parameters, spawns the HTTP and
//! remote-exec workers, starts the stress generator, waits out the session
//! duration, then cancels and joins every worker and writes the log trailer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Local;
use metrics::{counter, gauge, histogram};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{SessionError, SessionParams, SessionReport, SessionRequest};
use super::worker::{JoinOutcome, WorkerHandle, WorkerKind};
use crate::config::SessionSettings;
use crate::log_sink::LogSink;
use crate::probe::{HttpProbe, LogLine, RemoteExecProbe, RemoteExecutor};
use crate::stress::StressDriver;

/// Status reported for every session that ran to its end
pub const STATUS_COMPLETED: &str = "completed";

/// Orchestrates probe sessions. Cheap to clone; clones share the
/// single-session lock.
#[derive(Clone)]
pub struct SessionOrchestrator {
    settings: Arc<SessionSettings>,
    executor: Arc<dyn RemoteExecutor>,
    stress: Arc<dyn StressDriver>,
    active: Arc<Mutex<()>>,
    shutdown: CancellationToken,
    completed: Arc<AtomicU64>,
}

impl SessionOrchestrator {
    pub fn new(
        settings: SessionSettings,
        executor: Arc<dyn RemoteExecutor>,
        stress: Arc<dyn StressDriver>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            executor,
            stress,
            active: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a session is currently running
    pub fn is_active(&self) -> bool {
        self.active.try_lock().is_err()
    }

    /// Sessions that ran to completion, including ones whose caller went away
    pub fn sessions_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Cut the run phase of the current session short (process shutdown).
    /// Shutdown and finalization still run. New sessions are not affected
    /// by this token once it fired, so call it only when the process exits.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run one full probe session and return once it has completed.
    ///
    /// The session body runs on its own task, so dropping this future (for
    /// example on client disconnect) never skips worker shutdown or the trailer.
    pub async fn run(&self, request: SessionRequest) -> Result<SessionReport, SessionError> {
        let guard = self
            .active
            .clone()
            .try_lock_owned()
            .map_err(|_| SessionError::Busy)?;

        let params = SessionParams::resolve(&request, &self.settings)?;
        let client = HttpProbe::client(self.settings.http_timeout)?;

        let this = self.clone();
        tokio::spawn(async move { this.run_session(guard, params, client).await })
            .await
            .map_err(|e| SessionError::Aborted(e.to_string()))?
    }

    async fn run_session(
        &self,
        _guard: OwnedMutexGuard<()>,
        params: SessionParams,
        client: reqwest::Client,
    ) -> Result<SessionReport, SessionError> {
        let session_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        counter!("loadprobe_sessions_total").increment(1);
        gauge!("loadprobe_session_active").set(1.0);

        info!(
            session = %session_id,
            rps = params.rps,
            duration = ?params.duration,
            interval = ?params.probe_interval,
            workers_per_target = params.workers_per_target,
            "Starting probe session"
        );

        let result = self
            .drive(&session_id, &params, client, started)
            .await;

        gauge!("loadprobe_session_active").set(0.0);
        histogram!("loadprobe_session_duration_seconds").record(started.elapsed());
        match result {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(ref e) => error!(session = %session_id, "Probe session failed: {}", e),
        }
        result
    }

    async fn drive(
        &self,
        session_id: &str,
        params: &SessionParams,
        client: reqwest::Client,
        started: Instant,
    ) -> Result<SessionReport, SessionError> {
        // 1. Fresh log with the start marker first
        let sink = LogSink::create(&self.settings.log_path).await?;
        sink.append(LogLine::Start(Local::now())).await?;

        // 2. HTTP workers, mirrored across the configured targets
        let mut workers = Vec::new();
        for (host, url) in &params.targets {
            for _ in 0..params.workers_per_target {
                let probe = HttpProbe::new(
                    client.clone(),
                    url.clone(),
                    *host,
                    params.probe_interval,
                    sink.clone(),
                );
                workers.push(WorkerHandle::spawn(WorkerKind::Http, |cancel| {
                    probe.run(cancel)
                }));
            }
        }
        if params.targets.is_empty() {
            warn!(session = %session_id, "No HTTP targets configured");
        }

        // 3. Stress generator
        if let Err(e) = self.stress.start().await {
            warn!(session = %session_id, "Failed to start stress generator: {}", e);
        }

        // 4. Remote-exec worker
        match params.remote_target {
            Some(ref target) => {
                let probe = RemoteExecProbe::new(
                    self.executor.clone(),
                    target.clone(),
                    self.settings.remote_exec_timeout,
                    self.settings.remote_exec_interval,
                    sink.clone(),
                );
                workers.push(WorkerHandle::spawn(WorkerKind::RemoteExec, |cancel| {
                    probe.run(cancel)
                }));
            }
            None => info!(session = %session_id, "Remote-exec probing disabled for this session"),
        }

        let workers_spawned = workers.len();
        debug!(session = %session_id, workers = workers_spawned, "Workers spawned");

        // Run phase
        let deadline = tokio::time::Instant::from_std(started) + params.duration;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = self.shutdown.cancelled() => {
                warn!(session = %session_id, "Run phase interrupted by shutdown");
            }
        }

        // Shutdown: signal everyone first, then join each with its own grace period
        for worker in &workers {
            worker.cancel();
        }
        let mut workers_abandoned = 0;
        for worker in workers {
            if worker.join(self.settings.worker_grace_period).await == JoinOutcome::Abandoned {
                workers_abandoned += 1;
            }
        }
        if workers_abandoned > 0 {
            counter!("loadprobe_workers_abandoned_total").increment(workers_abandoned as u64);
        }
        self.stress.stop().await;

        let runtime_seconds = write_trailer(session_id, &sink, started).await;

        info!(
            session = %session_id,
            runtime_seconds,
            workers_spawned,
            workers_abandoned,
            "Probe session completed"
        );

        Ok(SessionReport {
            session_id: session_id.to_string(),
            status: STATUS_COMPLETED.to_string(),
            log_destination: sink.path().display().to_string(),
            runtime_seconds,
            workers_spawned,
            workers_abandoned,
        })
    }
}

/// Write the end marker and runtime, then seal the log. The session ran its
/// full course by now, so a failing write is logged and does not change the
/// caller-visible result.
async fn write_trailer(session_id: &str, sink: &LogSink, started: Instant) -> u64 {
    let runtime_seconds = started.elapsed().as_secs();
    let trailer = [LogLine::End(Local::now()), LogLine::Runtime(runtime_seconds)];
    if let Err(e) = sink.finish(&trailer).await {
        error!(session = %session_id, "Failed to write session trailer: {}", e);
    }
    runtime_seconds
}

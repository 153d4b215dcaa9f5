//! Remote execution probe worker
//!
//! Each tick runs the three fixed [`RemoteOp`]s in order against one remote
//! target, each under its own timeout, and records one outcome per operation.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{ProbeOutcome, RemoteOp, RemoteTarget};
use crate::log_sink::{LogSink, LogSinkError};

/// Runs a command inside a remote execution target
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `argv` in `target` and return its exit code
    /// (`None` if the process was terminated by a signal)
    async fn exec(&self, target: &RemoteTarget, argv: &[&str]) -> io::Result<Option<i32>>;
}

/// Executor backed by `kubectl exec`
pub struct KubectlExecutor {
    kubectl: String,
}

impl KubectlExecutor {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    /// Arguments passed to kubectl for one remote command
    pub fn args(target: &RemoteTarget, argv: &[&str]) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            target.pod.clone(),
            "-n".to_string(),
            target.namespace.clone(),
        ];
        if let Some(ref component) = target.component {
            args.push("-c".to_string());
            args.push(component.clone());
        }
        args.push("--".to_string());
        args.extend(argv.iter().map(|a| a.to_string()));
        args
    }
}

impl Default for KubectlExecutor {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl RemoteExecutor for KubectlExecutor {
    async fn exec(&self, target: &RemoteTarget, argv: &[&str]) -> io::Result<Option<i32>> {
        // kill_on_drop reaps kubectl when the surrounding timeout fires
        let output = Command::new(&self.kubectl)
            .args(Self::args(target, argv))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output.status.code())
    }
}

/// Remote-exec probe worker bound to one target
pub struct RemoteExecProbe {
    executor: Arc<dyn RemoteExecutor>,
    target: RemoteTarget,
    op_timeout: Duration,
    interval: Duration,
    sink: LogSink,
}

impl RemoteExecProbe {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        target: RemoteTarget,
        op_timeout: Duration,
        interval: Duration,
        sink: LogSink,
    ) -> Self {
        Self {
            executor,
            target,
            op_timeout,
            interval,
            sink,
        }
    }

    /// Run until `cancel` fires or the session log is sealed
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            pod = %self.target.pod,
            namespace = %self.target.namespace,
            "Running remote commands in pod {}/{}",
            self.target.pod,
            self.target.namespace
        );

        while !cancel.is_cancelled() {
            if self.tick().await.is_err() {
                debug!(pod = %self.target.pod, "Session log sealed, remote-exec worker exiting");
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(pod = %self.target.pod, "Remote-exec probe worker stopped");
    }

    /// Run all operations once. Only a sealed log ends the tick early.
    pub async fn tick(&self) -> Result<(), LogSinkError> {
        for op in RemoteOp::ALL {
            let outcome = self.run_op(op).await;
            counter!("loadprobe_probe_outcomes_total", "kind" => outcome.kind()).increment(1);

            match self.sink.append(outcome).await {
                Ok(()) => {}
                Err(LogSinkError::Sealed) => return Err(LogSinkError::Sealed),
                Err(e) => warn!(op = op.label(), "Failed to record remote-exec outcome: {}", e),
            }
        }
        Ok(())
    }

    async fn run_op(&self, op: RemoteOp) -> ProbeOutcome {
        let exec = self.executor.exec(&self.target, op.argv());
        match tokio::time::timeout(self.op_timeout, exec).await {
            Ok(Ok(code)) => ProbeOutcome::RemoteResult {
                op,
                exit_code: code.unwrap_or(-1),
            },
            Ok(Err(e)) => {
                error!(op = op.label(), "Remote {} failed: {}", op.label(), e);
                ProbeOutcome::RemoteError {
                    op,
                    message: e.to_string(),
                }
            }
            Err(_) => {
                error!(op = op.label(), "Remote {} timed out after {:?}", op.label(), self.op_timeout);
                ProbeOutcome::RemoteError {
                    op,
                    message: format!("timed out after {:?}", self.op_timeout),
                }
            }
        }
    }
}

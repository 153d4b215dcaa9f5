//! Handles for spawned probe workers

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// What a worker probes, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Http,
    RemoteExec,
}

/// How a worker's join attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The worker task panicked
    Failed,
    /// The worker missed its grace period and was left running
    Abandoned,
}

/// Orchestrator-owned handle to one worker task.
///
/// The worker holds the only other clone of the cancellation token and only
/// ever reads it.
pub struct WorkerHandle {
    pub id: Uuid,
    pub kind: WorkerKind,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a worker with its own cancellation token
    pub fn spawn<F, Fut>(kind: WorkerKind, worker: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker(cancel.clone()));
        Self {
            id: Uuid::new_v4(),
            kind,
            cancel,
            task,
        }
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait up to `grace` for the worker to exit. A worker that does not make it
    /// is detached, never aborted.
    pub async fn join(self, grace: Duration) -> JoinOutcome {
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => {
                debug!(worker = %self.id, kind = ?self.kind, "Worker joined");
                JoinOutcome::Joined
            }
            Ok(Err(e)) => {
                error!(worker = %self.id, kind = ?self.kind, "Worker task failed: {}", e);
                JoinOutcome::Failed
            }
            Err(_) => {
                warn!(
                    worker = %self.id,
                    kind = ?self.kind,
                    "Worker did not stop within {:?}, abandoning",
                    grace
                );
                JoinOutcome::Abandoned
            }
        }
    }
}

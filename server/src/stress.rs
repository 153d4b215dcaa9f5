//! System-stress generator boundary
//!
//! The generator itself is an external process. The orchestrator only starts
//! it at session start and stops it at shutdown.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StressError {
    #[error("Stress command is empty")]
    EmptyCommand,

    #[error("Failed to spawn stress generator: {0}")]
    Spawn(#[from] io::Error),
}

#[async_trait]
pub trait StressDriver: Send + Sync {
    async fn start(&self) -> Result<(), StressError>;

    async fn stop(&self);
}

/// Used when no stress command is configured
pub struct NoopStressDriver;

#[async_trait]
impl StressDriver for NoopStressDriver {
    async fn start(&self) -> Result<(), StressError> {
        info!("No stress generator configured, skipping system stress");
        Ok(())
    }

    async fn stop(&self) {}
}

/// Runs an external command for the lifetime of a session
pub struct CommandStressDriver {
    command: Vec<String>,
    stop_timeout: Duration,
    child: Mutex<Option<Child>>,
}

impl CommandStressDriver {
    pub fn new(command: Vec<String>, stop_timeout: Duration) -> Self {
        Self {
            command,
            stop_timeout,
            child: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StressDriver for CommandStressDriver {
    async fn start(&self) -> Result<(), StressError> {
        let (program, args) = self.command.split_first().ok_or(StressError::EmptyCommand)?;

        let mut guard = self.child.lock().await;
        if guard.is_some() {
            debug!("Stress generator already running");
            return Ok(());
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(pid = ?child.id(), "Started stress generator: {}", self.command.join(" "));
        *guard = Some(child);
        Ok(())
    }

    async fn stop(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        if let Err(e) = child.start_kill() {
            // Already exited on its own
            debug!("Stress generator kill failed: {}", e);
        }
        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => info!("Stress generator stopped ({})", status),
            Ok(Err(e)) => warn!("Failed to reap stress generator: {}", e),
            Err(_) => warn!(
                "Stress generator did not exit within {:?}, abandoning",
                self.stop_timeout
            ),
        }
    }
}

//! Append-only session log shared by all probe workers
//!
//! Every line is written with a single `write_all` while holding the sink's lock,
//! then flushed and synced before the lock is released. Concurrent producers can
//! therefore interleave whole lines but never partial ones.
//!
//! Once the session trailer is written the sink is sealed: workers that missed
//! their grace period get [`LogSinkError::Sealed`] instead of writing after the
//! trailer.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::probe::LogLine;

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("IO error on session log: {0}")]
    Io(#[from] io::Error),

    #[error("Session log is sealed")]
    Sealed,
}

/// Thread-safe, append-only writer for one session log file
#[derive(Clone)]
pub struct LogSink {
    path: PathBuf,
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    /// Create (or truncate) the log file, creating parent directories as needed
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, LogSinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let file = File::create(&path).await?;
        debug!("Opened session log {:?}", path);

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(Some(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it durably before returning
    pub async fn append(&self, line: impl Into<LogLine>) -> Result<(), LogSinkError> {
        let line = line.into();
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(LogSinkError::Sealed)?;
        write_line(file, &line).await
    }

    /// Append the trailer lines and seal the sink against further writes
    pub async fn finish(&self, trailer: &[LogLine]) -> Result<(), LogSinkError> {
        let mut guard = self.file.lock().await;
        let mut file = guard.take().ok_or(LogSinkError::Sealed)?;
        for line in trailer {
            write_line(&mut file, line).await?;
        }
        debug!("Sealed session log {:?}", self.path);
        Ok(())
    }

    pub async fn is_sealed(&self) -> bool {
        self.file.lock().await.is_none()
    }
}

async fn write_line(file: &mut File, line: &LogLine) -> Result<(), LogSinkError> {
    let mut buf = line.to_string();
    buf.push('\n');
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

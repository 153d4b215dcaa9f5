//! HTTP probe worker
//!
//! Issues one header-only request per tick against a single target and records
//! the response status. Failures are recorded and the loop keeps going.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{HostTag, HttpStatus, ProbeOutcome};
use crate::log_sink::{LogSink, LogSinkError};

/// One HTTP probe worker bound to a single target
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    host: HostTag,
    interval: Duration,
    sink: LogSink,
}

impl HttpProbe {
    /// `client` carries the per-request timeout; it is cheap to clone and shared
    /// by all HTTP workers of a session.
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        host: HostTag,
        interval: Duration,
        sink: LogSink,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            host,
            interval,
            sink,
        }
    }

    /// Build the HTTP client used by probe workers
    pub fn client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(timeout).build()
    }

    /// Run until `cancel` fires or the session log is sealed
    pub async fn run(self, cancel: CancellationToken) {
        debug!(url = %self.url, host = %self.host, "HTTP probe worker started");

        while !cancel.is_cancelled() {
            let outcome = self.probe_once().await;
            counter!("loadprobe_probe_outcomes_total", "kind" => outcome.kind()).increment(1);

            match self.sink.append(outcome).await {
                Ok(()) => {}
                Err(LogSinkError::Sealed) => break,
                Err(e) => warn!(url = %self.url, "Failed to record HTTP probe outcome: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(url = %self.url, host = %self.host, "HTTP probe worker stopped");
    }

    /// Issue one HEAD request and classify the result
    pub async fn probe_once(&self) -> ProbeOutcome {
        let start = Instant::now();
        let result = self.client.head(&self.url).send().await;
        histogram!("loadprobe_http_probe_duration_seconds").record(start.elapsed());

        match result {
            Ok(response) => ProbeOutcome::HttpResult {
                host: self.host,
                status: HttpStatus::Code(response.status().as_u16()),
            },
            Err(e) if e.is_timeout() => ProbeOutcome::HttpResult {
                host: self.host,
                status: HttpStatus::Timeout,
            },
            Err(e) => ProbeOutcome::HttpError {
                message: error_chain(&e),
            },
        }
    }
}

/// reqwest's top-level message hides the cause ("error sending request"),
/// so include the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

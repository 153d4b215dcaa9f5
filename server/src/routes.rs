//! HTTP route handlers for the session API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::time::Instant;

use crate::session::{SessionError, SessionOrchestrator, SessionReport, SessionRequest};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: SessionOrchestrator) -> Self {
        Self {
            orchestrator,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn sessions_completed(&self) -> u64 {
        self.orchestrator.sessions_completed()
    }
}

/// Error response for the session API
#[derive(Debug, Serialize)]
pub struct SessionErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<SessionError> for SessionErrorResponse {
    fn from(e: SessionError) -> Self {
        let code = match &e {
            SessionError::Config(_) => "invalid_config",
            SessionError::Busy => "session_active",
            SessionError::Log(_) => "io_error",
            SessionError::Client(_) | SessionError::Aborted(_) => "internal",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for SessionErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "invalid_config" => StatusCode::BAD_REQUEST,
            "session_active" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    session_active: bool,
    uptime_seconds: u64,
}

#[derive(Serialize)]
struct MetricsResponse {
    /// Server uptime in seconds
    uptime_seconds: u64,
    /// Server version
    version: &'static str,
    /// Whether a probe session is running
    session_active: bool,
    /// Sessions that ran to completion since startup
    sessions_completed: u64,
}

/// POST /api/session - Run a probe session and return once it has completed
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionReport>, SessionErrorResponse> {
    state.orchestrator.run(request).await.map(Json).map_err(|e| {
        match &e {
            SessionError::Config(_) | SessionError::Busy => {
                tracing::warn!("Rejected session request: {}", e)
            }
            _ => tracing::error!("Probe session failed: {}", e),
        }
        SessionErrorResponse::from(e)
    })
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        session_active: state.orchestrator.is_active(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        session_active: state.orchestrator.is_active(),
        sessions_completed: state.sessions_completed(),
    })
}

/// Build session API routes. `/start` is kept for older web UIs.
pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/session", post(start_session))
        .route("/start", post(start_session))
        .with_state(state)
}

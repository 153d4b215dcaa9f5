pub mod orchestrator;
pub mod types;
pub mod worker;

pub use orchestrator::{STATUS_COMPLETED, SessionOrchestrator};
pub use types::{
    ConfigError, DurationSpec, RemoteTargetRequest, RpsSpec, SessionError, SessionParams,
    SessionReport, SessionRequest, parse_duration, probe_interval, workers_per_target,
};
pub use worker::{JoinOutcome, WorkerHandle, WorkerKind};

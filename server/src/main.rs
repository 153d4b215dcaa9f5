use axum::{Router, response::IntoResponse, routing::get};
use loadprobe_server::config::Config;
use loadprobe_server::probe::KubectlExecutor;
use loadprobe_server::stress::{CommandStressDriver, NoopStressDriver, StressDriver};
use loadprobe_server::{AppState, SessionOrchestrator, session_routes};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Initialize the Prometheus metrics recorder
fn setup_prometheus_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

async fn shutdown_signal(orchestrator: SessionOrchestrator) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown requested, ending any running probe session");
    orchestrator.shutdown();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = setup_prometheus_metrics();
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadprobe=debug,loadprobe_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, log_path={:?}",
        config.host, config.port, config.session.log_path
    );

    let stress: Arc<dyn StressDriver> = match config.stress.command.clone() {
        Some(command) => {
            info!("Stress generator: {}", command.join(" "));
            Arc::new(CommandStressDriver::new(
                command,
                config.session.worker_grace_period,
            ))
        }
        None => {
            info!("Stress generator disabled (STRESS_COMMAND not set)");
            Arc::new(NoopStressDriver)
        }
    };
    let executor = Arc::new(KubectlExecutor::new(config.session.kubectl_path.clone()));
    let orchestrator = SessionOrchestrator::new(config.session.clone(), executor, stress);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = session_routes(AppState::new(orchestrator.clone()))
        .merge(Router::new().route("/metrics/prometheus", get(prometheus_metrics)))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Add static file serving if configured (web UI)
    let app = if let Some(ref static_dir) = config.static_files.dir {
        if static_dir.exists() {
            info!("Serving static files from: {:?}", static_dir);

            let index_path = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_path));

            let static_service = ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .service(serve_dir);

            app.fallback_service(static_service)
        } else {
            warn!(
                "Static files directory not found: {:?} - static file serving disabled",
                static_dir
            );
            app
        }
    } else {
        info!("Static file serving disabled (STATIC_FILES_DIR not set)");
        app
    };

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("LoadProbe server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await?;

    Ok(())
}

//! Integration Tests for LoadProbe Server
//!
//! These tests run full probe sessions against local targets and verify the
//! resulting session log, plus the HTTP API in front of the orchestrator.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::util::ServiceExt;

mod common;
use common::*;

use loadprobe_server::session::{DurationSpec, RemoteTargetRequest, RpsSpec, SessionRequest};

fn remote_target() -> RemoteTargetRequest {
    RemoteTargetRequest {
        pod: Some("web-0".to_string()),
        namespace: Some("prod".to_string()),
        component: None,
    }
}

// ============================================================================
// Session Tests
// ============================================================================

mod sessions {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_second_session_log_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let log_path = settings.log_path.clone();
        let orchestrator = create_orchestrator(settings, Arc::new(FixedExitExecutor::new(0)));

        let request = SessionRequest {
            target_url_1: Some(spawn_target(StatusCode::OK).await),
            target_url_2: Some(spawn_target(StatusCode::SERVICE_UNAVAILABLE).await),
            requests_per_second: Some(RpsSpec::Number(20)),
            duration: DurationSpec::Seconds(1),
            ..SessionRequest::default()
        };
        let report = orchestrator.run(request).await.unwrap();

        assert_eq!(report.status, "completed");
        assert_eq!(report.log_destination, log_path.display().to_string());
        assert_eq!(report.workers_spawned, 6);
        assert_eq!(report.workers_abandoned, 0);
        assert!(report.runtime_seconds >= 1);

        let lines = read_lines(&log_path);
        assert!(lines[0].starts_with("[START] "));
        assert_eq!(count_prefix(&lines, "[START]"), 1);
        assert_eq!(count_prefix(&lines, "[END]"), 1);
        assert_eq!(count_prefix(&lines, "[RUNTIME]"), 1);
        assert!(lines[lines.len() - 2].starts_with("[END] "));
        assert!(lines[lines.len() - 1].starts_with("[RUNTIME] "));
        for line in &lines {
            assert!(is_well_formed(line), "malformed line: {line:?}");
        }

        let runtime: u64 = lines[lines.len() - 1]
            .trim_start_matches("[RUNTIME] ")
            .trim_end_matches(" секунд")
            .parse()
            .unwrap();
        assert!(runtime >= 1);

        assert!(lines.iter().any(|l| l == "[RESULT] host=1 code=200"));
        assert!(lines.iter().any(|l| l == "[RESULT] host=2 code=503"));
        assert_eq!(count_prefix(&lines, "[K8S_"), 0);
    }

    #[tokio::test]
    async fn test_incomplete_remote_target_disables_remote_probing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let log_path = settings.log_path.clone();
        let executor = Arc::new(FixedExitExecutor::new(0));
        let orchestrator = create_orchestrator(settings, executor.clone());

        let request = SessionRequest {
            duration: DurationSpec::Seconds(1),
            remote_exec_target: Some(RemoteTargetRequest {
                pod: Some("web-0".to_string()),
                namespace: None,
                component: Some("app".to_string()),
            }),
            ..SessionRequest::default()
        };
        let report = orchestrator.run(request).await.unwrap();

        assert_eq!(report.workers_spawned, 0);
        assert_eq!(executor.calls(), 0);
        let lines = read_lines(&log_path);
        assert_eq!(count_prefix(&lines, "[K8S_"), 0);
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn test_remote_ticks_produce_three_lines_each() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let log_path = settings.log_path.clone();
        let orchestrator = create_orchestrator(settings, Arc::new(FixedExitExecutor::new(1)));

        let request = SessionRequest {
            duration: DurationSpec::Seconds(1),
            remote_exec_target: Some(remote_target()),
            ..SessionRequest::default()
        };
        let report = orchestrator.run(request).await.unwrap();
        assert_eq!(report.workers_spawned, 1);

        let lines = read_lines(&log_path);
        let remote: Vec<&String> = lines.iter().filter(|l| l.starts_with("[K8S_")).collect();
        assert!(!remote.is_empty());
        assert_eq!(remote.len() % 3, 0, "partial tick recorded: {remote:?}");
        for tick in remote.chunks(3) {
            assert_eq!(tick[0], "[K8S_RESULT] type=read exit_code=1");
            assert_eq!(tick[1], "[K8S_RESULT] type=unauth-ping exit_code=1");
            assert_eq!(tick[2], "[K8S_RESULT] type=write exit_code=1");
        }
    }

    #[tokio::test]
    async fn test_stuck_worker_is_abandoned_and_nothing_follows_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(&dir);
        settings.remote_exec_timeout = Duration::from_secs(3);
        settings.worker_grace_period = Duration::from_millis(200);
        let log_path = settings.log_path.clone();
        let orchestrator = create_orchestrator(settings, Arc::new(HangingExecutor));

        let request = SessionRequest {
            duration: DurationSpec::Seconds(1),
            remote_exec_target: Some(remote_target()),
            ..SessionRequest::default()
        };
        let started = Instant::now();
        let report = orchestrator.run(request).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(report.workers_abandoned, 1);

        // Let the abandoned worker's op time out and try to write
        tokio::time::sleep(Duration::from_secs(3)).await;

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 3, "unexpected lines: {lines:?}");
        assert!(lines[1].starts_with("[END] "));
        assert!(lines[2].starts_with("[RUNTIME] "));
    }

    #[tokio::test]
    async fn test_unreachable_target_records_errors_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let log_path = settings.log_path.clone();
        let orchestrator = create_orchestrator(settings, Arc::new(FixedExitExecutor::new(0)));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let request = SessionRequest {
            target_url_1: Some(dead_url),
            requests_per_second: Some(RpsSpec::Number(1)),
            duration: DurationSpec::Seconds(1),
            ..SessionRequest::default()
        };
        let report = orchestrator.run(request).await.unwrap();
        assert_eq!(report.status, "completed");

        let lines = read_lines(&log_path);
        assert!(count_prefix(&lines, "[ERROR] curl failed: ") >= 1);
        assert!(lines.iter().all(|l| is_well_formed(l)));
    }
}

// ============================================================================
// HTTP Route Integration Tests
// ============================================================================

mod http_routes {
    use super::*;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        ));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["session_active"], false);
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_duration_returns_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        ));

        let response = app
            .oneshot(post_json(
                "/api/session",
                serde_json::json!({"url1": "http://127.0.0.1:1/", "duration": "ten"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["code"], "invalid_config");
        assert!(!dir.path().join("logs").exists());
    }

    #[tokio::test]
    async fn test_start_session_returns_completion_record() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let log_path = settings.log_path.clone();
        let app = create_test_app(create_orchestrator(
            settings,
            Arc::new(FixedExitExecutor::new(0)),
        ));

        let target = spawn_target(StatusCode::OK).await;
        let response = app
            .oneshot(post_json(
                "/start",
                serde_json::json!({"url1": target, "rps": 10, "duration": "1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "completed");
        assert_eq!(json["log_destination"], log_path.display().to_string());
        assert_eq!(json["workers_spawned"], 2);
    }

    #[tokio::test]
    async fn test_negative_duration_returns_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        ));

        for duration in [serde_json::json!(-5), serde_json::json!(1.5)] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/session",
                    serde_json::json!({"url1": "http://127.0.0.1:1/", "duration": duration}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["code"], "invalid_config");
        }
    }

    #[tokio::test]
    async fn test_excessive_rps_returns_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        ));

        for rps in [serde_json::json!(u64::MAX), serde_json::json!("100000")] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/session",
                    serde_json::json!({"url1": "http://127.0.0.1:1/", "rps": rps, "duration": 1}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["code"], "invalid_config");
        }
        assert!(!dir.path().join("logs").exists());
    }

    #[tokio::test]
    async fn test_legacy_form_body_runs_remote_worker() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(FixedExitExecutor::new(0));
        let app = create_test_app(create_orchestrator(test_settings(&dir), executor.clone()));

        let target = spawn_target(StatusCode::OK).await;
        let response = app
            .oneshot(post_json(
                "/start",
                serde_json::json!({
                    "url1": target,
                    "rps": "10",
                    "duration": "1",
                    "pod": "web-0",
                    "namespace": "prod"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "completed");
        assert_eq!(json["workers_spawned"], 3);
        assert!(executor.calls() >= 3);
    }

    #[tokio::test]
    async fn test_metrics_counts_sessions_run_outside_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        );
        let app = create_test_app(orchestrator.clone());

        orchestrator
            .run(SessionRequest {
                duration: DurationSpec::Seconds(1),
                ..SessionRequest::default()
            })
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["sessions_completed"], 1);
    }

    #[tokio::test]
    async fn test_concurrent_session_returns_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = create_orchestrator(
            test_settings(&dir),
            Arc::new(FixedExitExecutor::new(0)),
        );
        let app = create_test_app(orchestrator.clone());

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(SessionRequest {
                        duration: DurationSpec::Seconds(1),
                        ..SessionRequest::default()
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let response = app
            .oneshot(post_json("/api/session", serde_json::json!({"duration": 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "session_active");

        running.await.unwrap().unwrap();
    }
}

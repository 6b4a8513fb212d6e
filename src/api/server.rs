use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_live, health_ready, metrics, report_today_stats, status, today_stats, AppState,
};
use crate::alerts::WebhookNotifier;
use crate::config::MonitorConfig;
use crate::metrics::MonitorMetrics;
use crate::monitor::{MonitorWorker, TaskMonitor};
use crate::source::SqliteTaskSource;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Probes
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        // Status
        .route("/api/status", get(status))
        .route("/api/today-stats", get(today_stats))
        .route("/api/today-stats/report", post(report_today_stats))
        // Prometheus scrape
        .route("/metrics", get(metrics))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the monitor and its HTTP server until a shutdown signal arrives
pub async fn run_server(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(SqliteTaskSource::open(&config.task_db_path)?);
    let transport = Arc::new(WebhookNotifier::new()?);
    let metrics = MonitorMetrics::new()?;

    let monitor = Arc::new(TaskMonitor::new(
        config.clone(),
        source,
        transport,
        metrics,
        chrono::Local::now().naive_local(),
    ));
    monitor.restore();

    // Start background worker
    let mut worker = MonitorWorker::new(Arc::clone(&monitor));
    let worker_handle = worker.start(config.check_interval());

    let state = Arc::new(AppState {
        monitor: Arc::clone(&monitor),
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting merchwatch server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight cycle finish before the final snapshot
    if let Err(e) = worker.shutdown(worker_handle).await {
        tracing::error!(error = %e, "Failed to write final snapshot");
    }

    tracing::info!("merchwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, stopping monitor...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Classification, TaskRecord};
    use crate::source::MemoryTaskSource;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        monitor: Arc<TaskMonitor>,
        source: Arc<MemoryTaskSource>,
        _dir: TempDir,
    }

    fn create_test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let now = chrono::Local::now().naive_local();
        let source = Arc::new(MemoryTaskSource::new(now.date()));

        // No channels configured, so every post is skipped without a network call
        let monitor = Arc::new(TaskMonitor::new(
            MonitorConfig::default()
                .with_task_keys("PROC", &["REVIEW"])
                .with_persist_dir(dir.path()),
            source.clone(),
            Arc::new(WebhookNotifier::new().unwrap()),
            MonitorMetrics::new().unwrap(),
            now,
        ));

        let state = Arc::new(AppState {
            monitor: Arc::clone(&monitor),
        });
        TestApp {
            router: build_router(state),
            monitor,
            source,
            _dir: dir,
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_follows_source() {
        let app = create_test_app();
        let request = || {
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.router.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        app.source.set_unavailable(true);
        let response = app.router.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let app = create_test_app();
        let now = chrono::Local::now().naive_local();
        app.source.upsert(
            TaskRecord::new("T1", now - chrono::Duration::hours(1), Classification::Unfinished),
            "PROC",
            "REVIEW",
        );
        app.monitor.run_cycle(now).await.unwrap();

        let (status, json) = get_json(app.router, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["application"], "merchwatch");
        assert_eq!(json["status"], "running");
        assert_eq!(json["taskStats"]["timeoutTasks"], 0);
        assert_eq!(json["taskStats"]["timeoutFinishTasks"], 1);
        assert_eq!(json["config"]["taskTimeoutMinutes"], 3);
        assert_eq!(json["config"]["checkIntervalSeconds"], 60);
        assert_eq!(json["taskSource"]["connectionTest"], "ok");
        assert_eq!(json["taskSource"]["databaseInfo"]["backend"], "memory");
        assert_eq!(json["taskSource"]["databaseInfo"]["taskCount"], 1);
    }

    #[tokio::test]
    async fn test_status_with_source_down() {
        let app = create_test_app();
        app.source.set_unavailable(true);

        let (status, json) = get_json(app.router, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["taskSource"]["connectionTest"]
            .as_str()
            .unwrap()
            .starts_with("failed:"));
        assert!(json["taskSource"]["databaseInfo"].is_null());
    }

    #[tokio::test]
    async fn test_today_stats() {
        let app = create_test_app();

        let (status, json) = get_json(app.router, "/api/today-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["todayTaskCount"], 0);
        assert!(json["lastStatsTime"].is_null());
        assert!(json["today"].is_string());
        assert!(json["currentTime"].is_string());
    }

    #[tokio::test]
    async fn test_report_with_no_channel_is_not_sent() {
        let app = create_test_app();

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/today-stats/report")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["sent"], false);
    }

    #[tokio::test]
    async fn test_metrics_scrape() {
        let app = create_test_app();
        app.monitor.metrics().increment_task_total(2);

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("task_total 2"));
        assert!(text.contains("unfinished_total 0"));
    }
}

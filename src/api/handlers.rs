use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::alerts::Delivery;
use crate::data::{Classification, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::monitor::TaskMonitor;
use crate::source::SourceInfo;

/// Application state shared across handlers
pub struct AppState {
    pub monitor: Arc<TaskMonitor>,
}

fn local_now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_live() -> &'static str {
    "ok"
}

pub async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.ping_source().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub application: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub timestamp: String,
    pub task_stats: TaskStats,
    pub config: ConfigInfo,
    pub task_source: TaskSourceInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub timeout_tasks: usize,
    pub timeout_finish_tasks: usize,
    pub today_task_count: u64,
    pub last_stats_time: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    pub task_timeout_minutes: u32,
    pub check_interval_seconds: u64,
    pub unfinished_timeout_minutes: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSourceInfo {
    pub connection_test: String,
    pub database_info: Option<SourceInfo>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let monitor = &state.monitor;
    let registry = monitor.state().registry();
    let config = monitor.config();

    let connection_test = match monitor.ping_source().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("failed: {}", e),
    };
    let database_info = match monitor.source_info().await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read task source info");
            None
        }
    };

    Json(StatusResponse {
        application: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        timestamp: local_now().format(TIMESTAMP_FORMAT).to_string(),
        task_stats: TaskStats {
            timeout_tasks: registry.count(Classification::Unclaimed),
            timeout_finish_tasks: registry.count(Classification::Unfinished),
            today_task_count: monitor.state().today_count(),
            last_stats_time: monitor
                .state()
                .last_stats_at()
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
        },
        config: ConfigInfo {
            task_timeout_minutes: config.unclaimed_timeout_minutes,
            check_interval_seconds: config.check_interval_secs,
            unfinished_timeout_minutes: config.unfinished_timeout_minutes,
        },
        task_source: TaskSourceInfo {
            connection_test,
            database_info,
        },
    })
}

// ============================================================================
// Today Stats
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStatsResponse {
    pub today: String,
    pub today_task_count: u64,
    pub last_stats_time: Option<String>,
    pub current_time: String,
}

pub async fn today_stats(State(state): State<Arc<AppState>>) -> Json<TodayStatsResponse> {
    let now = local_now();
    let monitor_state = state.monitor.state();

    Json(TodayStatsResponse {
        today: now.format(DATE_FORMAT).to_string(),
        today_task_count: monitor_state.today_count(),
        last_stats_time: monitor_state
            .last_stats_at()
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
        current_time: now.format(TIMESTAMP_FORMAT).to_string(),
    })
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub sent: bool,
}

pub async fn report_today_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportResponse>, ApiError> {
    let delivery = state
        .monitor
        .send_onboarding_report(local_now())
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(ReportResponse {
        sent: delivery == Delivery::Sent,
    }))
}

// ============================================================================
// Metrics
// ============================================================================

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state
        .monitor
        .metrics()
        .encode()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

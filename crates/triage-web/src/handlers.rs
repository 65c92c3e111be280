//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use triage_admin::TriageMetrics;
use triage_core::{KioskSubmission, PatientStatus, TriageError, TriageLevel};
use triage_workflow::{QueueFilter, TriageEngine};
use uuid::Uuid;

/// 自助机会话请求头
pub const SESSION_HEADER: &str = "x-kiosk-session";

/// 未带会话头时使用的会话
pub const DEFAULT_SESSION: &str = "default";

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: TriageEngine,
    pub metrics: TriageMetrics,
}

impl AppState {
    pub fn new(engine: TriageEngine, metrics: TriageMetrics) -> Self {
        Self { engine, metrics }
    }

    async fn refresh_waiting_gauge(&self) {
        let status = self.engine.kiosk_status().await;
        self.metrics.set_waiting_patients(status.waiting_count);
    }
}

/// API 错误响应
#[derive(Debug)]
pub struct ApiError(pub TriageError);

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TriageError::NotFound(_) => StatusCode::NOT_FOUND,
            TriageError::Validation(_) => StatusCode::BAD_REQUEST,
            TriageError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            TriageError::SessionBusy(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// API根路径处理器
pub async fn api_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "QuickTriage ER API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "classifier": state.engine.classifier_name(),
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus 指标
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| TriageError::Internal(format!("Failed to render metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// 自助签到
pub async fn create_check_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<KioskSubmission>,
) -> ApiResult<impl IntoResponse> {
    if !submission.has_content() {
        return Err(TriageError::Validation(
            "Describe symptoms, record voice, mark the body map or add a photo".to_string(),
        )
        .into());
    }

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string();

    info!("Kiosk check-in submitted from session {}", session_id);
    let outcome = state.engine.submit_check_in(&session_id, submission).await?;

    state
        .metrics
        .record_check_in(outcome.fallback_used, outcome.classifier_elapsed);
    state.refresh_waiting_gauge().await;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// 紧急按钮
pub async fn trigger_emergency(State(state): State<AppState>) -> impl IntoResponse {
    let record = state.engine.trigger_emergency().await;

    state.metrics.record_emergency();
    state.refresh_waiting_gauge().await;

    (StatusCode::CREATED, Json(record))
}

/// 队列查询参数，多个值用逗号分隔
#[derive(Debug, Default, Deserialize)]
pub struct QueueQueryParams {
    pub status: Option<String>,
    pub level: Option<String>,
    pub urgent_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueueQueryParams {
    pub fn into_filter(self) -> triage_core::Result<QueueFilter> {
        let statuses = self
            .status
            .map(|raw| {
                split_list(&raw)
                    .map(str::parse::<PatientStatus>)
                    .collect::<triage_core::Result<Vec<_>>>()
            })
            .transpose()?;

        let levels = self
            .level
            .map(|raw| {
                split_list(&raw)
                    .map(|item| {
                        item.parse::<i64>()
                            .ok()
                            .and_then(TriageLevel::from_level)
                            .ok_or_else(|| {
                                TriageError::Validation(format!("Invalid triage level: {}", item))
                            })
                    })
                    .collect::<triage_core::Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(QueueFilter {
            statuses,
            levels,
            urgent_only: self.urgent_only.unwrap_or(false),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// 护士看板队列
pub async fn get_queue(
    State(state): State<AppState>,
    Query(params): Query<QueueQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    Ok(Json(state.engine.dashboard(&filter).await))
}

/// 队列统计
pub async fn get_queue_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.stats().await)
}

/// 自助机屏幕信息
pub async fn get_kiosk_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.kiosk_status().await)
}

/// 单个患者
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_patient(id).await?))
}

/// 状态更新请求
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: PatientStatus,
}

/// 更新患者状态
pub async fn update_patient_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = state.engine.update_status(id, request.status).await?;

    state.metrics.record_status_update();
    state.refresh_waiting_gauge().await;

    Ok(Json(record))
}

/// 叫号
pub async fn call_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let record = state.engine.call_patient(id).await?;

    state.metrics.record_status_update();
    state.refresh_waiting_gauge().await;

    Ok(Json(record))
}

/// 推进到下一状态
pub async fn advance_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let record = state.engine.advance_status(id).await?;

    state.metrics.record_status_update();
    state.refresh_waiting_gauge().await;

    Ok(Json(record))
}

//! HTTP request handlers.

use super::AppState;
use crate::advisor::AnalysisError;
use crate::gateway::GatewayError;
use crate::inventory::{filter_command_presets, filter_devices, group_by_subnet, summarize};
use crate::models::{DevicePatch, NewBackup, NewDevice, NewTemplate, TemplatePatch, Vendor};
use crate::orchestrator::{BatchError, BatchRequest};
use crate::state::StateError;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

// ============================================================================
// Errors
// ============================================================================

/// Error returned by every handler as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found", what))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", self.status, self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        if e.is_not_found() {
            return Self::new(StatusCode::NOT_FOUND, e.to_string());
        }
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<StateError> for ApiError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::Validation(_) | StateError::Import(_) => {
                Self::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            StateError::Gateway(e) => e.into(),
            StateError::Load(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            BatchError::Busy => Self::new(StatusCode::CONFLICT, e.to_string()),
            BatchError::Gateway(e) => e.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        let status = match e {
            AnalysisError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Health & dashboard
// ============================================================================

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "mode": state.state.mode(),
        "aiConfigured": state.advisor.is_configured(),
        "jobRunning": state.orchestrator.is_busy(),
    }))
}

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let devices = state.state.devices().await;
    let backups = state.state.backups().await;
    Json(summarize(&devices, &backups))
}

pub async fn handle_refresh(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.state.refresh_state().await?;
    Ok(Json(json!({
        "devices": state.state.devices().await.len(),
        "backups": state.state.backups().await.len(),
    })))
}

// ============================================================================
// API: Devices
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn handle_get_devices(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let devices = state.state.devices().await;
    Json(filter_devices(&devices, &query.q))
}

pub async fn handle_get_device_groups(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let devices = state.state.devices().await;
    Json(group_by_subnet(&filter_devices(&devices, &query.q)))
}

pub async fn handle_get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.state.fetch_device(&id).await?))
}

pub async fn handle_create_device(
    State(state): State<AppState>,
    Json(req): Json<NewDevice>,
) -> ApiResult<impl IntoResponse> {
    let device = state.state.add_device(req).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn handle_update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DevicePatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.state.update_device(&id, req).await?))
}

pub async fn handle_delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.state.delete_device(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteBody {
    #[serde(default)]
    pub device_ids: Vec<String>,
}

pub async fn handle_batch_delete_devices(
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteBody>,
) -> ApiResult<impl IntoResponse> {
    state.state.delete_devices(&req.device_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body is the raw CSV text.
pub async fn handle_import_devices(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "CSV upload must be UTF-8 text"))?;
    Ok(Json(state.state.import_devices_csv(text).await?))
}

// ============================================================================
// API: Backups
// ============================================================================

pub async fn handle_get_backups(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.state.backups().await)
}

pub async fn handle_create_backup(
    State(state): State<AppState>,
    Json(req): Json<NewBackup>,
) -> ApiResult<impl IntoResponse> {
    let backup = state.state.record_backup(req).await?;
    Ok((StatusCode::CREATED, Json(backup)))
}

pub async fn handle_get_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.state.fetch_backup(&id).await?))
}

pub async fn handle_delete_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.state.delete_backup(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_download_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (filename, bytes) = state.state.download_backup(&id).await?;
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', "_"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

// ============================================================================
// API: Login templates
// ============================================================================

/// Reloads from the backend; serves the cached list if that fails.
pub async fn handle_get_templates(State(state): State<AppState>) -> impl IntoResponse {
    match state.state.load_templates().await {
        Ok(templates) => Json(templates),
        Err(e) => {
            tracing::warn!("Reloading login templates failed, serving cache: {}", e);
            Json(state.state.templates().await)
        }
    }
}

pub async fn handle_create_template(
    State(state): State<AppState>,
    Json(req): Json<NewTemplate>,
) -> ApiResult<impl IntoResponse> {
    let template = state.state.add_template(req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn handle_update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TemplatePatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.state.update_template(&id, req).await?))
}

pub async fn handle_delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.state.delete_template(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// API: Presets & batch backup
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PresetQuery {
    /// Comma-separated device ids.
    #[serde(default)]
    pub device_ids: String,
}

pub async fn handle_get_presets(
    State(state): State<AppState>,
    Query(query): Query<PresetQuery>,
) -> impl IntoResponse {
    let ids: Vec<&str> = query
        .device_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    let selected: Vec<_> = state
        .state
        .devices()
        .await
        .into_iter()
        .filter(|d| ids.contains(&d.id.as_str()))
        .collect();
    Json(filter_command_presets(&selected))
}

pub async fn handle_batch_backup(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.orchestrator.submit(req).await?))
}

// ============================================================================
// API: AI assistance
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBody {
    pub backup_id: String,
}

pub async fn handle_audit(
    State(state): State<AppState>,
    Json(req): Json<AuditBody>,
) -> ApiResult<impl IntoResponse> {
    let backup = match state.state.backup(&req.backup_id).await {
        Some(backup) => backup,
        None => state.state.fetch_backup(&req.backup_id).await?,
    };
    let vendor = match state.state.device(&backup.switch_id).await {
        Some(device) => device.vendor,
        None => {
            tracing::warn!(
                "Backup {} belongs to unknown device {}, auditing as {}",
                backup.id,
                backup.switch_id,
                Vendor::default()
            );
            Vendor::default()
        }
    };

    Ok(Json(state.advisor.audit_backup(&backup, vendor).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub intent: String,
    #[serde(default)]
    pub vendor: Vendor,
    pub device_count: Option<usize>,
}

pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateBody>,
) -> ApiResult<impl IntoResponse> {
    let device_count = match req.device_count {
        Some(n) => n.max(1),
        None => {
            let devices = state.state.devices().await;
            devices.iter().filter(|d| d.vendor == req.vendor).count().max(1)
        }
    };

    let script = state
        .advisor
        .request_batch_script(&req.intent, req.vendor, device_count)
        .await?;
    Ok(Json(script))
}

/// Fallback for unknown `/api` paths.
pub async fn handle_not_found() -> ApiError {
    ApiError::not_found("Route")
}

//! Session HTTP Handlers
//!
//! 会话快照、原稿载入与开篇设置（元数据、生成参数、大纲确认）、手动保存

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::commands::{ConfirmBeats, LoadManuscript, SubmitConfiguration, SubmitMetadata};
use crate::application::SessionSnapshot;
use crate::domain::manuscript::{Beat, GenerationConfig, NovelMetadata};
use crate::infrastructure::http::dto::{AcceptedResponse, ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::handlers::spawn_task;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::worker::save_project;

/// 原稿文件大小上限
const MAX_MANUSCRIPT_BYTES: usize = 100 * 1024 * 1024;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoadManuscriptRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBeatsRequest {
    pub beats: Vec<Beat>,
}

#[derive(Debug, Serialize)]
pub struct SaveProjectResponse {
    pub saved: bool,
    pub last_saved: Option<DateTime<Utc>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// 当前会话快照
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SessionSnapshot>> {
    Json(ApiResponse::success(state.orchestrator.snapshot()))
}

/// 上传原稿 TXT 文件（后台切块并识别元数据，完成后通过 WS 通知）
pub async fn upload_manuscript(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let mut text: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_lowercase());
        let content_type = field.content_type().unwrap_or("application/octet-stream");
        let is_txt = filename.as_deref().is_some_and(|f| f.ends_with(".txt"));
        if !is_txt && !content_type.contains("text") {
            return Err(ApiError::BadRequest("Only TXT files are allowed".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        if bytes.len() > MAX_MANUSCRIPT_BYTES {
            return Err(ApiError::BadRequest(format!(
                "File too large. Maximum size is {} MB",
                MAX_MANUSCRIPT_BYTES / 1024 / 1024
            )));
        }

        text = Some(
            String::from_utf8(bytes.to_vec())
                .map_err(|_| ApiError::BadRequest("File must be valid UTF-8 text".to_string()))?,
        );
    }

    let text = text.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    tracing::info!(bytes = text.len(), "Manuscript uploaded");
    start_load(&state, text)
}

/// 以 JSON 正文载入原稿
pub async fn load_manuscript(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadManuscriptRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    start_load(&state, req.text)
}

fn start_load(state: &AppState, text: String) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state.orchestrator.load_manuscript(LoadManuscript { text })?;
    spawn_task("load_manuscript", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "load_manuscript",
        state.orchestrator.phase(),
    ))))
}

/// 提交（用户确认或修改后的）元数据
pub async fn submit_metadata(
    State(state): State<Arc<AppState>>,
    Json(metadata): Json<NovelMetadata>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .orchestrator
        .submit_metadata(SubmitMetadata { metadata })?;
    Ok(Json(ApiResponse::ok()))
}

/// 提交生成参数，后台生成大纲
pub async fn submit_configuration(
    State(state): State<Arc<AppState>>,
    Json(config): Json<GenerationConfig>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state
        .orchestrator
        .submit_configuration(SubmitConfiguration { config })?;
    spawn_task("submit_configuration", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "submit_configuration",
        state.orchestrator.phase(),
    ))))
}

/// 确认大纲，后台分析文风并生成第一章
pub async fn confirm_beats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmBeatsRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state
        .orchestrator
        .confirm_beats(ConfirmBeats { beats: req.beats })?;
    spawn_task("confirm_beats", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "confirm_beats",
        state.orchestrator.phase(),
    ))))
}

/// 立即保存（不等待自动保存的防抖）
pub async fn save_now(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SaveProjectResponse>>, ApiError> {
    if !state.orchestrator.is_saveable() {
        return Err(ApiError::BadRequest(
            "Nothing to save yet: metadata and at least one chapter are required".to_string(),
        ));
    }
    let saved = save_project(&state.orchestrator, state.project_store.as_ref()).await;
    if !saved {
        return Err(ApiError::Internal("Failed to save project".to_string()));
    }
    Ok(Json(ApiResponse::success(SaveProjectResponse {
        saved,
        last_saved: state.orchestrator.snapshot().last_saved,
    })))
}

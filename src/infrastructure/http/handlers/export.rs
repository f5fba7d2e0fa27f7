//! Export HTTP Handlers
//!
//! 以附件形式下载 JSON 存档与 Word 兼容的 HTML 文稿

use std::sync::Arc;

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::infrastructure::export::{
    document_file_name, export_document_html, export_json, json_file_name,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

fn attachment(content_type: &'static str, file_name: &str, body: String) -> Response {
    (
        [
            (CONTENT_TYPE, content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            ),
        ],
        body,
    )
        .into_response()
}

/// 导出完整项目 JSON
pub async fn export_project_json(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let project = state.orchestrator.project_state().await;
    let body = export_json(&project)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize project: {}", e)))?;
    let file_name = json_file_name(&project, Utc::now());

    tracing::info!(file_name = %file_name, bytes = body.len(), "Project exported as JSON");
    Ok(attachment("application/json", &file_name, body))
}

/// 导出可在 Word 中打开的文稿
pub async fn export_document(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let project = state.orchestrator.project_state().await;
    if project.chapters.is_empty() {
        return Err(ApiError::BadRequest("No chapters to export".to_string()));
    }
    let body = export_document_html(&project);
    let file_name = document_file_name(&project);

    tracing::info!(file_name = %file_name, chapters = project.chapters.len(), "Manuscript exported");
    Ok(attachment("application/msword", &file_name, body))
}

//! Knowledge HTTP Handlers
//!
//! 设定库查看与手动维护、故事问答

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::domain::knowledge::{CharacterUpdate, KnowledgeDelta, KnowledgeStore, LoreCandidate};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskStoryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskStoryResponse {
    pub answer: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// 设定库快照
pub async fn get_knowledge(State(state): State<Arc<AppState>>) -> Json<ApiResponse<KnowledgeStore>> {
    let store = state.orchestrator.knowledge().snapshot().await;
    Json(ApiResponse::success(store))
}

/// 手动添加设定条目（同名已存在时不覆盖）
pub async fn add_lore(
    State(state): State<Arc<AppState>>,
    Json(candidate): Json<LoreCandidate>,
) -> Result<Json<ApiResponse<KnowledgeDelta>>, ApiError> {
    let delta = state.orchestrator.add_lore(candidate).await?;
    Ok(Json(ApiResponse::success(delta)))
}

/// 手动更新角色状态（只覆盖提供的字段）
pub async fn update_character(
    State(state): State<Arc<AppState>>,
    Json(update): Json<CharacterUpdate>,
) -> Result<Json<ApiResponse<KnowledgeDelta>>, ApiError> {
    let delta = state.orchestrator.update_character(update).await?;
    Ok(Json(ApiResponse::success(delta)))
}

/// 故事问答
pub async fn ask_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskStoryRequest>,
) -> Result<Json<ApiResponse<AskStoryResponse>>, ApiError> {
    let answer = state.orchestrator.ask_story(&req.question).await?;
    Ok(Json(ApiResponse::success(AskStoryResponse { answer })))
}

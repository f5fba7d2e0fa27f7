//! Chapter HTTP Handlers
//!
//! 撤销、排序、版本切换、手动编辑、查找替换、片段改写与删除

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::application::commands::{
    EditChapter, ErasePassage, FindReplace, ReorderChapter, RewritePassage, SelectVersion,
};
use crate::domain::manuscript::MoveDirection;
use crate::infrastructure::http::dto::{ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UndoResponse {
    /// 被撤销的章节
    pub chapter_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct ReorderChapterRequest {
    pub index: usize,
    pub direction: MoveDirection,
}

#[derive(Debug, Serialize)]
pub struct ReorderChapterResponse {
    pub moved: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectVersionRequest {
    pub chapter_id: u32,
    pub version: usize,
}

#[derive(Debug, Deserialize)]
pub struct EditChapterRequest {
    pub chapter_id: u32,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct EditChapterResponse {
    pub current_version: usize,
}

#[derive(Debug, Deserialize)]
pub struct FindReplaceRequest {
    pub find: String,
    #[serde(default)]
    pub replace: String,
}

#[derive(Debug, Serialize)]
pub struct FindReplaceResponse {
    pub chapters_changed: usize,
}

#[derive(Debug, Deserialize)]
pub struct RewritePassageRequest {
    pub chapter_id: u32,
    pub selection: String,
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct ErasePassageRequest {
    pub chapter_id: u32,
    pub selection: String,
}

#[derive(Debug, Serialize)]
pub struct PassageResponse {
    /// 章节的新内容
    pub content: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// 撤销最新章节
pub async fn undo(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse<UndoResponse>>, ApiError> {
    let chapter_id = state.orchestrator.undo()?;
    Ok(Json(ApiResponse::success(UndoResponse { chapter_id })))
}

/// 上移/下移章节，边界处不动
pub async fn reorder_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderChapterRequest>,
) -> Result<Json<ApiResponse<ReorderChapterResponse>>, ApiError> {
    let moved = state.orchestrator.reorder_chapter(ReorderChapter {
        index: req.index,
        direction: req.direction,
    })?;
    Ok(Json(ApiResponse::success(ReorderChapterResponse { moved })))
}

/// 切换章节的当前版本
pub async fn select_version(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectVersionRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.orchestrator.select_version(SelectVersion {
        chapter_id: req.chapter_id,
        version: req.version,
    })?;
    Ok(Json(ApiResponse::ok()))
}

/// 手动编辑，结果作为新版本
pub async fn edit_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditChapterRequest>,
) -> Result<Json<ApiResponse<EditChapterResponse>>, ApiError> {
    let current_version = state.orchestrator.edit_chapter(EditChapter {
        chapter_id: req.chapter_id,
        content: req.content,
    })?;
    Ok(Json(ApiResponse::success(EditChapterResponse { current_version })))
}

/// 全文查找替换
pub async fn find_replace(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FindReplaceRequest>,
) -> Result<Json<ApiResponse<FindReplaceResponse>>, ApiError> {
    let chapters_changed = state.orchestrator.find_replace(FindReplace {
        find: req.find,
        replace: req.replace,
    })?;
    Ok(Json(ApiResponse::success(FindReplaceResponse { chapters_changed })))
}

/// 改写选中片段（同步等待结果）
pub async fn rewrite_passage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RewritePassageRequest>,
) -> Result<Json<ApiResponse<PassageResponse>>, ApiError> {
    let content = state
        .orchestrator
        .rewrite_passage(RewritePassage {
            chapter_id: req.chapter_id,
            selection: req.selection,
            instruction: req.instruction,
        })?
        .await?;
    Ok(Json(ApiResponse::success(PassageResponse { content })))
}

/// 删除选中片段并衔接上下文（同步等待结果）
pub async fn erase_passage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ErasePassageRequest>,
) -> Result<Json<ApiResponse<PassageResponse>>, ApiError> {
    let content = state
        .orchestrator
        .erase_passage(ErasePassage {
            chapter_id: req.chapter_id,
            selection: req.selection,
        })?
        .await?;
    Ok(Json(ApiResponse::success(PassageResponse { content })))
}

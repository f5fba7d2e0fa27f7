//! Generation HTTP Handlers
//!
//! 交互周期：选择方向、精修、混沌转折

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::application::commands::{Decide, Refine};
use crate::application::prompts::REFINEMENT_DIRECTIVES;
use crate::domain::manuscript::{Choice, Placement};
use crate::infrastructure::http::dto::{AcceptedResponse, ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::handlers::spawn_task;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    /// 选项文本，或 "Interlude" 表示喘息章节
    pub choice: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub placement: Placement,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    #[serde(default)]
    pub directives: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectiveResponse {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChoicesResponse {
    pub choices: Vec<Choice>,
}

// ============================================================================
// Handlers
// ============================================================================

/// 选择下一步方向，后台运行一个生成周期
pub async fn decide(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    if req.choice.trim().is_empty() {
        return Err(ApiError::BadRequest("choice is required".to_string()));
    }
    let task = state.orchestrator.decide(Decide {
        choice: req.choice,
        instructions: req.instructions,
        placement: req.placement,
    })?;
    spawn_task("decide", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "decide",
        state.orchestrator.phase(),
    ))))
}

/// 进入精修选择
pub async fn enter_refinement(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.orchestrator.enter_refinement()?;
    Ok(Json(ApiResponse::ok()))
}

/// 按选中的指令精修最新章节
pub async fn refine(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefineRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state.orchestrator.refine(Refine {
        directives: req.directives,
    })?;
    spawn_task("refine", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "refine",
        state.orchestrator.phase(),
    ))))
}

/// 精修指令目录
pub async fn list_directives() -> Json<ApiResponse<Vec<DirectiveResponse>>> {
    let directives = REFINEMENT_DIRECTIVES
        .iter()
        .map(|d| DirectiveResponse {
            id: d.id,
            label: d.label,
            description: d.description,
        })
        .collect();
    Json(ApiResponse::success(directives))
}

/// 生成混沌转折，插到选项最前面
pub async fn inject_chaos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state.orchestrator.inject_chaos()?;
    spawn_task("inject_chaos", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "inject_chaos",
        state.orchestrator.phase(),
    ))))
}

/// 当前可选方向
pub async fn list_choices(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ChoicesResponse>> {
    Json(ApiResponse::success(ChoicesResponse {
        choices: state.orchestrator.snapshot().choices,
    }))
}

//! Automation HTTP Handlers
//!
//! 自动驾驶与按情节点批量生成（含一致性确认）

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::application::commands::{RunBatch, StartAutoPilot};
use crate::application::BatchConfirmationPort;
use crate::infrastructure::http::dto::{AcceptedResponse, ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::handlers::spawn_task;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartAutoPilotRequest {
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct RunBatchRequest {
    pub beat_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBatchRequest {
    /// 缺省时答复所有等待中的警告
    #[serde(default)]
    pub beat_id: Option<String>,
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfirmBatchResponse {
    pub resolved: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingConfirmationsResponse {
    pub beat_ids: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// 启动自动驾驶
pub async fn start_auto_pilot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartAutoPilotRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let task = state
        .orchestrator
        .start_auto_pilot(StartAutoPilot { count: req.count })?;
    spawn_task("auto_pilot", task);
    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "auto_pilot",
        state.orchestrator.phase(),
    ))))
}

/// 停止自动驾驶（当前周期会跑完）
pub async fn stop_auto_pilot(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Empty>> {
    state.orchestrator.stop_auto_pilot();
    Json(ApiResponse::ok())
}

/// 按情节点批量生成
pub async fn run_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunBatchRequest>,
) -> Result<Json<ApiResponse<AcceptedResponse>>, ApiError> {
    let confirmation: Arc<dyn BatchConfirmationPort> = state.confirmations.clone();
    let task = state.orchestrator.run_batch(
        RunBatch {
            beat_ids: req.beat_ids,
        },
        confirmation,
    )?;

    tokio::spawn(async move {
        match task.await {
            Ok(report) => tracing::info!(
                completed = report.completed,
                total = report.total,
                aborted = report.aborted,
                "Batch task finished"
            ),
            Err(e) => tracing::warn!(error = %e, "Batch task failed"),
        }
    });

    Ok(Json(ApiResponse::success(AcceptedResponse::new(
        "run_batch",
        state.orchestrator.phase(),
    ))))
}

/// 答复一致性警告：approve 继续，拒绝则中止剩余情节点
pub async fn confirm_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmBatchRequest>,
) -> Result<Json<ApiResponse<ConfirmBatchResponse>>, ApiError> {
    let targets = match req.beat_id {
        Some(beat_id) => vec![beat_id],
        None => state.confirmations.pending(),
    };

    let resolved: Vec<String> = targets
        .into_iter()
        .filter(|beat_id| state.confirmations.resolve(beat_id, req.approve))
        .collect();

    if resolved.is_empty() {
        return Err(ApiError::NotFound(
            "No consistency warning is waiting for confirmation".to_string(),
        ));
    }
    Ok(Json(ApiResponse::success(ConfirmBatchResponse { resolved })))
}

/// 等待答复的情节点
pub async fn pending_confirmations(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<PendingConfirmationsResponse>> {
    Json(ApiResponse::success(PendingConfirmationsResponse {
        beat_ids: state.confirmations.pending(),
    }))
}


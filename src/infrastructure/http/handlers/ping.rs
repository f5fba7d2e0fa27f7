//! Ping Handler
//!
//! 存活检查与生成后端健康检查

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Ping endpoint - 存活检查
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub backend: bool,
    pub busy: bool,
    pub websocket_clients: usize,
}

/// 生成后端是否可达
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    let backend = state.generator.health_check().await;
    if !backend {
        tracing::warn!("Generation backend health check failed");
    }
    Json(ApiResponse::success(HealthResponse {
        backend,
        busy: state.orchestrator.is_busy(),
        websocket_clients: state.event_publisher.receiver_count(),
    }))
}

//! Data Transfer Objects
//!
//! 统一响应结构；各接口的请求/响应结构放在对应 handler 文件里。

use serde::Serialize;

use crate::application::Phase;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// 长任务
// ============================================================================

/// 长任务已受理：结果通过 WebSocket 推送，或轮询 GET /api/session
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub operation: &'static str,
    pub status: &'static str,
    /// 受理时刻的阶段
    pub phase: Phase,
}

impl AcceptedResponse {
    pub fn new(operation: &'static str, phase: Phase) -> Self {
        Self {
            operation,
            status: "accepted",
            phase,
        }
    }
}

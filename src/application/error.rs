//! 应用层错误定义
//!
//! 编排器统一的错误类型

use thiserror::Error;

use crate::application::ports::{GenerationError, StoreError};
use crate::application::session::Phase;
use crate::domain::manuscript::ManuscriptError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 已有生成周期在运行
    #[error("A generation cycle is already running")]
    Busy,

    /// 当前阶段不允许该操作
    #[error("Operation '{operation}' is not allowed in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// 稿件规则违反
    #[error("Manuscript error: {0}")]
    Manuscript(#[from] ManuscriptError),

    /// 生成后端错误
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// 存档错误
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建阶段错误
    pub fn invalid_phase(operation: &'static str, phase: Phase) -> Self {
        Self::InvalidPhase { operation, phase }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

//! Text Generator Port - 文本生成后端抽象
//!
//! 定义生成调用的抽象接口，具体实现在 infrastructure/adapters 层。
//! 后端不持有任何会话状态。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

/// 生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Backend error ({status}): {message}")]
    BackendError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,
}

impl GenerationError {
    /// 限流判定：状态码 429，或错误信息包含 "quota" / "429"
    pub fn is_rate_limited(&self) -> bool {
        if let GenerationError::BackendError { status: 429, .. } = self {
            return true;
        }
        let message = self.to_string().to_lowercase();
        message.contains("quota") || message.contains("429")
    }
}

/// 输出格式
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    /// 自由文本
    #[default]
    Text,
    /// 受约束的 JSON 输出，可附带 schema
    Json { schema: Option<serde_json::Value> },
}

/// 生成请求
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_instruction: None,
            temperature: None,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json { schema: None };
        self
    }

    pub fn json_with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_format = ResponseFormat::Json {
            schema: Some(schema),
        };
        self
    }
}

/// 增量文本片段流
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Text Generator Port
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    /// 流式生成，逐片段返回文本
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, GenerationError>;

    /// 单次生成（结构化抽取调用使用）
    async fn generate_once(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// 检查后端是否可用
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let status = GenerationError::BackendError {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(status.is_rate_limited());

        let quota = GenerationError::BackendError {
            status: 400,
            message: "Resource has been exhausted (e.g. check Quota).".to_string(),
        };
        assert!(quota.is_rate_limited());

        assert!(GenerationError::NetworkError("got 429 from proxy".to_string()).is_rate_limited());
        assert!(!GenerationError::Timeout.is_rate_limited());
        assert!(!GenerationError::BackendError {
            status: 500,
            message: "internal".to_string()
        }
        .is_rate_limited());
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("model-a", "hello")
            .with_temperature(0.5)
            .with_system_instruction("be brief")
            .json();

        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.system_instruction.as_deref(), Some("be brief"));
        assert_eq!(request.response_format, ResponseFormat::Json { schema: None });
    }
}

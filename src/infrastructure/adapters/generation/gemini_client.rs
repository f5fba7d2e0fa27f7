//! Gemini Client - 基于 gemini-rust 的生成后端
//!
//! 实现 TextGeneratorPort：
//! - 单次调用: generate_content().execute()
//! - 流式调用: generate_content().execute_stream()
//!
//! 每个模型名缓存一个 `Gemini` 实例；健康检查直接请求模型列表接口。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{StreamExt, TryStreamExt};
use gemini_rust::{client::Model, Gemini};
use reqwest::{Client, Url};

use crate::application::ports::{
    GenerationError, GenerationRequest, ResponseFormat, TextGeneratorPort, TextStream,
};

/// Gemini 客户端配置
#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    /// API 基础 URL（包含版本前缀）
    pub base_url: String,
    pub api_key: String,
    /// 单次调用与建立流的超时（秒）
    pub timeout_secs: u64,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
        }
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    config: GeminiClientConfig,
    base_url: Url,
    clients: DashMap<String, Arc<Gemini>>,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, GenerationError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(map_transport_error)?;
        Ok(Self {
            config,
            base_url,
            clients: DashMap::new(),
            http,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// 取出（必要时创建）指定模型的客户端
    fn client_for(&self, model: &str) -> Result<Arc<Gemini>, GenerationError> {
        if let Some(client) = self.clients.get(model) {
            return Ok(client.clone());
        }
        let client = Gemini::with_model_and_base_url(
            &self.config.api_key,
            model_for(model),
            self.base_url.clone(),
        )
        .map_err(|e| GenerationError::NetworkError(format!("client creation failed: {e}")))?;
        let client = Arc::new(client);
        self.clients.insert(model.to_string(), client.clone());
        Ok(client)
    }
}

/// 基础 URL 需要以 `/` 结尾，否则相对路径拼接会丢掉版本前缀
fn normalize_base_url(base_url: &str) -> Result<Url, GenerationError> {
    let trimmed = base_url.trim_end_matches('/');
    Url::parse(&format!("{trimmed}/"))
        .map_err(|e| GenerationError::NetworkError(format!("invalid base url {base_url}: {e}")))
}

/// 模型名转换为 gemini-rust 的模型标识
fn model_for(name: &str) -> Model {
    if name.starts_with("models/") {
        Model::Custom(name.to_string())
    } else {
        Model::Custom(format!("models/{name}"))
    }
}

/// 从错误文本中提取 HTTP 状态码，例如 "bad response from server; code 429; ..."
fn extract_status_code(message: &str) -> Option<u16> {
    let start = message.find("code ")? + 5;
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn map_client_error(err: impl std::fmt::Display) -> GenerationError {
    let message = err.to_string();
    match extract_status_code(&message) {
        Some(status) => GenerationError::BackendError { status, message },
        None if message.to_lowercase().contains("timed out") => GenerationError::Timeout,
        None => GenerationError::NetworkError(message),
    }
}

fn map_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl TextGeneratorPort for GeminiClient {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, GenerationError> {
        let client = self.client_for(&request.model)?;
        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Opening generation stream"
        );

        let mut builder = client.generate_content().with_user_message(&request.prompt);
        if let Some(system) = &request.system_instruction {
            builder = builder.with_system_prompt(system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.with_temperature(temperature);
        }

        let stream = tokio::time::timeout(self.timeout(), builder.execute_stream())
            .await
            .map_err(|_| GenerationError::Timeout)?
            .map_err(|e| {
                tracing::warn!(error = %e, "Generation backend refused the stream");
                map_client_error(e)
            })?;

        let fragments = stream
            .into_stream()
            .map(|item| item.map(|response| response.text()).map_err(map_client_error))
            .filter(|item| {
                let keep = !matches!(item, Ok(text) if text.is_empty());
                async move { keep }
            });
        Ok(Box::pin(fragments))
    }

    async fn generate_once(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let client = self.client_for(&request.model)?;

        let mut builder = client.generate_content().with_user_message(&request.prompt);
        if let Some(system) = &request.system_instruction {
            builder = builder.with_system_prompt(system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.with_temperature(temperature);
        }
        if let ResponseFormat::Json { schema } = &request.response_format {
            builder = builder.with_response_mime_type("application/json");
            if let Some(schema) = schema {
                builder = builder.with_response_schema(schema.clone());
            }
        }

        let response = tokio::time::timeout(self.timeout(), builder.execute())
            .await
            .map_err(|_| GenerationError::Timeout)?
            .map_err(|e| {
                tracing::warn!(error = %e, "Generation backend returned an error");
                map_client_error(e)
            })?;

        let text = response.text();
        tracing::debug!(model = %request.model, text_len = text.len(), "Generation completed");
        Ok(text)
    }

    async fn health_check(&self) -> bool {
        let Ok(url) = self.base_url.join("models") else {
            return false;
        };
        match self
            .http
            .get(url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %map_transport_error(e), "Health check failed");
                false
            }
        }
    }
}

//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径（后者覆盖前者）
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `QUILL_SERVER__PORT=8080`
/// - `QUILL_LLM__API_KEY=...`
/// - `QUILL_LLM__DRAFTING_MODEL=gemini-2.5-pro`
/// - `QUILL_STORAGE__PROJECT_DB_PATH=/data/quill.sled`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// `config_path` 为 None 时搜索工作目录下的默认配置文件。
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("llm.base_url", "https://generativelanguage.googleapis.com/v1beta")?
        .set_default("llm.api_key", "")?
        .set_default("llm.analysis_model", "gemini-2.5-flash")?
        .set_default("llm.drafting_model", "gemini-2.5-pro")?
        .set_default("llm.timeout_secs", 300)?
        .set_default("llm.max_retries", 3)?
        .set_default("llm.retry_initial_delay_ms", 2000)?
        .set_default("automation.auto_pilot_delay_ms", 2000)?
        .set_default("chunking.rough_word_count", 1000)?
        .set_default("storage.project_db_path", "data/quill.sled")?
        .set_default("storage.autosave_debounce_ms", 5000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("QUILL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.llm.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM base URL cannot be empty".to_string(),
        ));
    }

    if config.llm.analysis_model.trim().is_empty() || config.llm.drafting_model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Model names cannot be empty".to_string(),
        ));
    }

    if config.chunking.rough_word_count == 0 {
        return Err(ConfigError::ValidationError(
            "Chunk size cannot be 0".to_string(),
        ));
    }

    if config.storage.project_db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Project database path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("LLM Base URL: {}", config.llm.base_url);
    tracing::info!("LLM API Key: {}", config.llm.masked_api_key());
    tracing::info!("Analysis Model: {}", config.llm.analysis_model);
    tracing::info!("Drafting Model: {}", config.llm.drafting_model);
    tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    tracing::info!(
        "Retry: {} attempts, initial delay {}ms",
        config.llm.max_retries,
        config.llm.retry_initial_delay_ms
    );
    tracing::info!("Auto-pilot Delay: {}ms", config.automation.auto_pilot_delay_ms);
    tracing::info!("Chunk Size: ~{} words", config.chunking.rough_word_count);
    tracing::info!("Project Store: {}", config.storage.project_db_path);
    tracing::info!("Autosave Debounce: {}ms", config.storage.autosave_debounce_ms);
    tracing::info!("Log Level: {} (json: {})", config.log.level, config.log.json);
    tracing::info!("=================================");
}

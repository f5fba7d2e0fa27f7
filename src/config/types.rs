//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 生成后端配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 自动驾驶配置
    #[serde(default)]
    pub automation: AutomationConfig,

    /// 原稿切块配置
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// 存档配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 生成后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API 基础 URL（包含版本前缀）
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API Key，为空时请求会被后端拒绝
    #[serde(default)]
    pub api_key: String,

    /// 结构化抽取使用的模型
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    /// 正文写作使用的模型
    #[serde(default = "default_drafting_model")]
    pub drafting_model: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// 限流时的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次重试前的等待（毫秒），之后每次翻倍
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_analysis_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_drafting_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay() -> u64 {
    2000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            analysis_model: default_analysis_model(),
            drafting_model: default_drafting_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay(),
        }
    }
}

impl LlmConfig {
    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    /// 日志中显示的 API Key（只保留末四位）
    pub fn masked_api_key(&self) -> String {
        if self.api_key.is_empty() {
            return "<unset>".to_string();
        }
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{tail}")
    }
}

/// 自动驾驶配置
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// 两次周期之间的等待（毫秒）
    #[serde(default = "default_auto_pilot_delay")]
    pub auto_pilot_delay_ms: u64,
}

fn default_auto_pilot_delay() -> u64 {
    2000
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            auto_pilot_delay_ms: default_auto_pilot_delay(),
        }
    }
}

impl AutomationConfig {
    pub fn auto_pilot_delay(&self) -> Duration {
        Duration::from_millis(self.auto_pilot_delay_ms)
    }
}

/// 原稿切块配置
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// 每块的大致词数
    #[serde(default = "default_rough_word_count")]
    pub rough_word_count: usize,
}

fn default_rough_word_count() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            rough_word_count: default_rough_word_count(),
        }
    }
}

/// 存档配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 项目存档（sled）路径
    #[serde(default = "default_project_db_path")]
    pub project_db_path: String,

    /// 自动保存防抖（毫秒）
    #[serde(default = "default_autosave_debounce")]
    pub autosave_debounce_ms: u64,
}

fn default_project_db_path() -> String {
    "data/quill.sled".to_string()
}

fn default_autosave_debounce() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            project_db_path: default_project_db_path(),
            autosave_debounce_ms: default_autosave_debounce(),
        }
    }
}

impl StorageConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LogConfig {
    /// RUST_LOG 未设置时使用的过滤规则
    pub fn filter_directive(&self) -> String {
        format!("{},quill={},tower_http=debug", self.level, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5070);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.llm.retry_initial_delay(), Duration::from_millis(2000));
        assert_eq!(config.automation.auto_pilot_delay(), Duration::from_millis(2000));
        assert_eq!(config.chunking.rough_word_count, 1000);
        assert_eq!(config.storage.project_db_path, "data/quill.sled");
        assert_eq!(config.storage.autosave_debounce(), Duration::from_millis(5000));
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5070");
    }

    #[test]
    fn test_masked_api_key() {
        let mut config = LlmConfig::default();
        assert_eq!(config.masked_api_key(), "<unset>");
        config.api_key = "abcdef123456".to_string();
        assert_eq!(config.masked_api_key(), "****3456");
    }

    #[test]
    fn test_filter_directive() {
        let config = LogConfig {
            level: "debug".to_string(),
            json: false,
        };
        assert_eq!(config.filter_directive(), "debug,quill=debug,tower_http=debug");
    }
}

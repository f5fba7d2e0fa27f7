//! Quill - 交互式长篇扩写工作台
//!
//! 启动顺序：配置 → 日志 → 生成后端 → 项目存档 → 编排器 → 后台 Worker → HTTP 服务

use std::sync::Arc;

use quill::application::{ModelConfig, Orchestrator, OrchestratorSettings, ProjectStorePort};
use quill::config::{load_config, print_config, AppConfig};
use quill::domain::context_window::MAX_CONTEXT_CHARS;
use quill::domain::ChunkConfig;
use quill::infrastructure::adapters::{
    GeminiClient, GeminiClientConfig, RetryPolicy, RetryingGenerator,
};
use quill::infrastructure::events::EventPublisher;
use quill::infrastructure::http::{AppState, HttpServer, ServerConfig};
use quill::infrastructure::persistence::sled::{SledProjectStore, SledStoreConfig};
use quill::infrastructure::worker::{
    save_project, AnalyticsTicker, AutosaveWorker, AutosaveWorkerConfig,
};

fn init_logging(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.filter_directive()));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Quill starting");
    print_config(&config);

    if config.llm.api_key.is_empty() {
        tracing::warn!("No API key configured; generation requests will be rejected by the backend");
    }

    // 确保存档目录存在
    if let Some(parent) = std::path::Path::new(&config.storage.project_db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 生成后端：Gemini 客户端 + 限流重试
    let client = GeminiClient::new(GeminiClientConfig {
        base_url: config.llm.base_url.clone(),
        api_key: config.llm.api_key.clone(),
        timeout_secs: config.llm.timeout_secs,
    })?;
    let generator = Arc::new(RetryingGenerator::new(
        client,
        RetryPolicy {
            max_retries: config.llm.max_retries,
            initial_delay: config.llm.retry_initial_delay(),
        },
    ));

    // 项目存档：启动时读取一次，只记录结果
    let store = SledProjectStore::new(&SledStoreConfig {
        db_path: config.storage.project_db_path.clone(),
    })?
    .arc();
    match store.load().await {
        Ok(Some(previous)) => tracing::info!(
            title = %previous.metadata.title,
            chapters = previous.chapters.len(),
            last_saved = %previous.last_saved,
            "Found saved project"
        ),
        Ok(None) => tracing::info!("No saved project found"),
        Err(e) => tracing::warn!(error = %e, "Failed to read saved project"),
    }

    // 事件发布器与编排器
    let event_publisher = Arc::new(EventPublisher::new());
    let settings = OrchestratorSettings {
        models: ModelConfig {
            analysis_model: config.llm.analysis_model.clone(),
            drafting_model: config.llm.drafting_model.clone(),
        },
        auto_pilot_delay: config.automation.auto_pilot_delay(),
        chunking: ChunkConfig {
            rough_word_count: config.chunking.rough_word_count,
        },
        context_budget: MAX_CONTEXT_CHARS,
    };
    let orchestrator = Orchestrator::new(generator.clone(), event_publisher.clone(), settings);

    // 后台 Worker
    let autosave = AutosaveWorker::new(
        AutosaveWorkerConfig {
            debounce: config.storage.autosave_debounce(),
        },
        event_publisher.subscribe(),
        orchestrator.clone(),
        store.clone(),
    );
    tokio::spawn(autosave.run());
    tokio::spawn(AnalyticsTicker::new(orchestrator.clone()).run());

    // HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        orchestrator.clone(),
        event_publisher,
        store.clone(),
        generator,
    ));
    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    // 等待后台设定抽取落地，再做最后一次保存
    orchestrator.knowledge().wait_idle().await;
    if save_project(&orchestrator, store.as_ref()).await {
        tracing::info!("Final project save complete");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

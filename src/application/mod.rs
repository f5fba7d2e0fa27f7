//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TextGenerator、ProjectStore、EventSink、BatchConfirmation）
//! - commands: 编排器接收的命令
//! - orchestrator: 生成编排器（会话状态机的唯一入口）
//! - session: 会话状态与同步状态迁移
//! - extraction / knowledge_base: 分析调用与设定库
//! - prompts: 提示词构造
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod extraction;
pub mod knowledge_base;
pub mod orchestrator;
pub mod ports;
pub mod prompts;
pub mod session;

// Re-exports
pub use error::ApplicationError;

pub use extraction::{ConsistencyReport, CritiquePoint, ExtractionService, ModelConfig};
pub use knowledge_base::{KnowledgeBase, KnowledgeUpdate};

pub use orchestrator::{
    BatchReport, CycleTask, Orchestrator, OrchestratorSettings, SessionSnapshot,
};

pub use ports::{
    // Batch confirmation
    BatchConfirmationPort,
    ConsistencyWarning,
    // Events
    EventSinkPort,
    NoopEventSink,
    SessionEvent,
    // Project store
    ProjectStorePort,
    StoreError,
    // Text generator
    GenerationError,
    GenerationRequest,
    ResponseFormat,
    TextGeneratorPort,
    TextStream,
};

pub use session::{BatchProgress, Phase, Session};

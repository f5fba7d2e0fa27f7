//! Quill - 交互式长篇扩写工作台
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Manuscript: 章节、版本历史、情节点、生成参数
//! - Knowledge: 设定条目与角色状态及其合并规则
//! - 上下文窗口、结构化输出解析、原稿切块
//!
//! 应用层 (application/):
//! - Ports: TextGenerator, ProjectStore, EventSink, BatchConfirmation
//! - Orchestrator: 会话状态机（生成周期、精修、自动驾驶、批量生成、编辑）
//! - Extraction / KnowledgeBase: 分析调用与设定库写者
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: JSON API + WebSocket
//! - Adapters: Gemini 客户端、重试装饰器、脚本化测试后端
//! - Persistence: Sled 项目存档
//! - Worker: 自动保存、编辑时长统计
//! - Events: WebSocket 事件发布
//! - Export: JSON 存档与 Word 兼容文稿

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};

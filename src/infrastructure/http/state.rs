//! Application State
//!
//! 所有 handler 共享的状态：编排器是会话状态的唯一入口，
//! 其余字段是 HTTP 层直接需要的基础设施。

use std::sync::Arc;

use crate::application::{Orchestrator, ProjectStorePort, TextGeneratorPort};
use crate::infrastructure::confirmation::PendingConfirmations;
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub event_publisher: Arc<EventPublisher>,
    /// 批量生成中等待答复的一致性警告
    pub confirmations: Arc<PendingConfirmations>,
    pub project_store: Arc<dyn ProjectStorePort>,
    /// 仅用于健康检查
    pub generator: Arc<dyn TextGeneratorPort>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        event_publisher: Arc<EventPublisher>,
        project_store: Arc<dyn ProjectStorePort>,
        generator: Arc<dyn TextGeneratorPort>,
    ) -> Self {
        Self {
            orchestrator,
            event_publisher,
            confirmations: Arc::new(PendingConfirmations::new()),
            project_store,
            generator,
        }
    }
}

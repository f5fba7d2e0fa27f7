//! Event Sink Port - 会话事件推送
//!
//! 编排器与设定库通过它对外广播进度，具体实现在 infrastructure/events。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::session::{BatchProgress, Phase};
use crate::domain::manuscript::Choice;

/// 会话事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum SessionEvent {
    /// 阶段变更
    PhaseChanged { phase: Phase },
    /// 流式可见文本增量
    StreamDelta { delta: String },
    /// 流式显示被清空
    StreamReset,
    /// 状态提示
    Status { message: String },
    /// 新章节提交
    ChapterCommitted {
        chapter_id: u32,
        title: String,
        pacing_score: u8,
        versions: usize,
    },
    /// 章节出现新版本或切换版本
    ChapterUpdated { chapter_id: u32, current_version: usize },
    /// 章节被撤销
    ChapterRemoved { chapter_id: u32 },
    /// 章节顺序变化
    ChaptersReordered { order: Vec<u32> },
    /// 选项列表替换
    ChoicesUpdated { choices: Vec<Choice> },
    /// 批量生成一致性警告，等待确认
    ConsistencyWarning {
        beat_id: String,
        description: String,
        issues: Vec<String>,
    },
    /// 批量生成进度
    BatchProgress(BatchProgress),
    /// 自动驾驶剩余次数
    AutoPilot { remaining: u32, active: bool },
    /// 设定库变化
    KnowledgeUpdated {
        lore_count: usize,
        character_count: usize,
    },
    /// 项目已保存
    ProjectSaved { at: DateTime<Utc> },
    /// 生成失败（会话已回到可交互阶段）
    GenerationFailed { message: String },
}

impl SessionEvent {
    /// 是否代表持久状态的变化（自动保存据此触发）
    pub fn is_state_change(&self) -> bool {
        !matches!(
            self,
            SessionEvent::StreamDelta { .. }
                | SessionEvent::StreamReset
                | SessionEvent::Status { .. }
                | SessionEvent::ProjectSaved { .. }
                | SessionEvent::AutoPilot { .. }
                | SessionEvent::BatchProgress(_)
        )
    }
}

/// Event Sink Port
pub trait EventSinkPort: Send + Sync {
    fn publish(&self, event: SessionEvent);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSinkPort for NoopEventSink {
    fn publish(&self, _event: SessionEvent) {}
}

//! 生成编排器
//!
//! 会话状态机的唯一入口。长任务（生成周期、精修、自动驾驶、批量生成）
//! 以 [`CycleTask`] 形式返回：忙碌标志和阶段检查在返回前同步完成，
//! 调用方可以直接 await，也可以交给 tokio::spawn 在后台运行。
//!
//! 会话锁是同步锁，持锁期间从不 await；跨 await 的只有生成调用本身。

mod automation;
mod cycle;
mod editing;
mod refinement;
mod setup;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;

use crate::application::error::ApplicationError;
use crate::application::extraction::{ExtractionService, ModelConfig};
use crate::application::knowledge_base::{KnowledgeBase, KnowledgeUpdate};
use crate::application::ports::{
    EventSinkPort, GenerationError, GenerationRequest, SessionEvent, TextGeneratorPort,
};
use crate::application::session::{BatchProgress, Phase, Session};
use crate::domain::context_window::{ContextWindow, MAX_CONTEXT_CHARS};
use crate::domain::knowledge::{CharacterUpdate, KnowledgeDelta, KnowledgeStore, LoreCandidate};
use crate::domain::manuscript::{Chapter, Choice, DetectedMetadata, NovelMetadata};
use crate::domain::{ChunkConfig, ProjectState, SessionAnalytics};

pub use automation::BatchReport;

/// 后台可运行的编排任务
pub type CycleTask<T> = Pin<Box<dyn Future<Output = Result<T, ApplicationError>> + Send>>;

/// 编排器设置
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub models: ModelConfig,
    /// 自动驾驶两次周期之间的等待
    pub auto_pilot_delay: Duration,
    pub chunking: ChunkConfig,
    /// 上下文字符预算
    pub context_budget: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            models: ModelConfig {
                analysis_model: "gemini-2.5-flash".to_string(),
                drafting_model: "gemini-2.5-pro".to_string(),
            },
            auto_pilot_delay: Duration::from_millis(2000),
            chunking: ChunkConfig::default(),
            context_budget: MAX_CONTEXT_CHARS,
        }
    }
}

/// 会话快照（HTTP 查询与 WebSocket 客户端初始化使用）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub busy: bool,
    pub status: String,
    pub metadata: Option<NovelMetadata>,
    pub detected: DetectedMetadata,
    pub chapters: Vec<Chapter>,
    pub choices: Vec<Choice>,
    pub cursor: usize,
    pub total_chunks: usize,
    pub pacing_streak: u32,
    pub auto_pilot_remaining: u32,
    pub auto_pilot_active: bool,
    pub batch: Option<BatchProgress>,
    pub streaming_text: String,
    pub analytics: SessionAnalytics,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// 单周期守卫：释放时清除忙碌标志
struct CycleGuard {
    busy: Arc<AtomicBool>,
}

impl CycleGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Result<Self, ApplicationError> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ApplicationError::Busy)?;
        Ok(Self { busy: busy.clone() })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// 生成编排器
pub struct Orchestrator {
    session: Mutex<Session>,
    busy: Arc<AtomicBool>,
    generator: Arc<dyn TextGeneratorPort>,
    extraction: Arc<ExtractionService>,
    knowledge: Arc<KnowledgeBase>,
    events: Arc<dyn EventSinkPort>,
    settings: OrchestratorSettings,
    window: ContextWindow,
}

impl Orchestrator {
    /// 创建编排器（需要在 tokio 运行时中调用，设定库写者任务随之启动）
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        events: Arc<dyn EventSinkPort>,
        settings: OrchestratorSettings,
    ) -> Arc<Self> {
        let extraction = Arc::new(ExtractionService::new(
            generator.clone(),
            settings.models.clone(),
        ));
        let knowledge = KnowledgeBase::new(KnowledgeStore::new(), extraction.clone(), events.clone());
        let window = ContextWindow::new(settings.context_budget);

        Arc::new(Self {
            session: Mutex::new(Session::new()),
            busy: Arc::new(AtomicBool::new(false)),
            generator,
            extraction,
            knowledge,
            events,
            settings,
            window,
        })
    }

    // ---- 内部工具 ----

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        self.events.publish(event);
    }

    fn enter_phase(&self, phase: Phase) {
        self.lock().set_phase(phase);
        tracing::debug!(phase = %phase, "Phase changed");
        self.publish(SessionEvent::PhaseChanged { phase });
    }

    fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        self.lock().set_status(message.clone());
        self.publish(SessionEvent::Status { message });
    }

    fn require_phase(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), ApplicationError> {
        let phase = self.lock().phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(ApplicationError::invalid_phase(operation, phase))
        }
    }

    fn ensure_idle(&self) -> Result<(), ApplicationError> {
        if self.is_busy() {
            Err(ApplicationError::Busy)
        } else {
            Ok(())
        }
    }

    /// 流式生成并实时更新可见投影，返回完整原始文本
    async fn stream_into_display(&self, request: GenerationRequest) -> Result<String, ApplicationError> {
        self.lock().streaming_mut().reset();
        self.publish(SessionEvent::StreamReset);

        let mut stream = self.generator.generate_stream(request).await?;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            let delta = self.lock().streaming_mut().push(&fragment);
            if let Some(delta) = delta {
                self.publish(SessionEvent::StreamDelta { delta });
            }
        }
        let delta = self.lock().streaming_mut().finish();
        if let Some(delta) = delta {
            self.publish(SessionEvent::StreamDelta { delta });
        }

        let raw = self.lock().streaming().raw().to_string();
        if raw.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }
        Ok(raw)
    }

    /// 生成阶段失败：不提交任何内容，停止自动化，回到 Decision
    fn fail_cycle(&self, operation: &'static str, error: &ApplicationError) {
        tracing::error!(operation, error = %error, "Generation cycle failed");
        let was_auto = {
            let mut session = self.lock();
            let was_auto = session.is_auto_pilot_active();
            session.stop_auto_pilot();
            session.set_batch(None);
            session.streaming_mut().reset();
            session.set_last_error(Some(error.to_string()));
            was_auto
        };
        if was_auto {
            self.publish(SessionEvent::AutoPilot {
                remaining: 0,
                active: false,
            });
        }
        self.publish(SessionEvent::GenerationFailed {
            message: error.to_string(),
        });
        self.set_status(format!("Error: {error}"));
        self.enter_phase(Phase::Decision);
    }

    fn publish_commit(&self, chapter_id: u32) {
        let event = self.lock().manuscript().chapter(chapter_id).map(|c| {
            SessionEvent::ChapterCommitted {
                chapter_id,
                title: c.title().to_string(),
                pacing_score: c.pacing_score().value(),
                versions: c.history().len(),
            }
        });
        if let Some(event) = event {
            self.publish(event);
        }
    }

    fn publish_choices(&self) {
        let choices = self.lock().choices().to_vec();
        self.publish(SessionEvent::ChoicesUpdated { choices });
    }

    // ---- 查询 ----

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let busy = self.is_busy();
        let session = self.lock();
        SessionSnapshot {
            phase: session.phase(),
            busy,
            status: session.status().to_string(),
            metadata: session.metadata().cloned(),
            detected: session.detected().clone(),
            chapters: session.manuscript().chapters().to_vec(),
            choices: session.choices().to_vec(),
            cursor: session.cursor(),
            total_chunks: session.source_chunks().len(),
            pacing_streak: session.pacing_streak(),
            auto_pilot_remaining: session.auto_pilot_remaining(),
            auto_pilot_active: session.is_auto_pilot_active(),
            batch: session.batch().cloned(),
            streaming_text: session.streaming().visible().to_string(),
            analytics: session.analytics().clone(),
            last_saved: session.last_saved(),
            last_error: session.last_error().map(str::to_string),
        }
    }

    /// 导出与存档使用的完整快照
    pub async fn project_state(&self) -> ProjectState {
        let store = self.knowledge.snapshot().await;
        self.lock()
            .project_state(store.lore().to_vec(), store.characters().to_vec())
    }

    pub fn is_saveable(&self) -> bool {
        self.lock().is_saveable()
    }

    pub fn mark_saved(&self, at: DateTime<Utc>) {
        self.lock().mark_saved(at);
        self.publish(SessionEvent::ProjectSaved { at });
    }

    pub fn record_editing_second(&self) {
        self.lock().analytics_mut().record_editing_seconds(1);
    }

    // ---- 设定库 ----

    /// 故事问答
    pub async fn ask_story(&self, question: &str) -> Result<String, ApplicationError> {
        if question.trim().is_empty() {
            return Err(ApplicationError::validation("question must not be empty"));
        }
        let lore_context = self.knowledge.retrieve_context(question).await;
        let history = self.lock().manuscript().full_text();
        Ok(self.extraction.ask_story(question, &lore_context, &history).await)
    }

    pub async fn add_lore(&self, candidate: LoreCandidate) -> Result<KnowledgeDelta, ApplicationError> {
        if candidate.key().is_none() {
            return Err(ApplicationError::validation("lore key must not be empty"));
        }
        Ok(self.knowledge.apply(KnowledgeUpdate::AddLore(candidate)).await)
    }

    pub async fn update_character(&self, update: CharacterUpdate) -> Result<KnowledgeDelta, ApplicationError> {
        if update.name.trim().is_empty() {
            return Err(ApplicationError::validation("character name must not be empty"));
        }
        Ok(self.knowledge.apply(KnowledgeUpdate::UpsertCharacter(update)).await)
    }

    /// 启动后台设定抽取（开启 auto_lore 时）
    fn maybe_extract_lore(&self, auto_lore: bool, text: &str) {
        if auto_lore {
            tracing::debug!("Spawning background lore extraction");
            self.knowledge.spawn_extraction(text.to_string());
        }
    }
}

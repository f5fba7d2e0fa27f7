//! 自动化：自动驾驶、批量生成、混沌注入

use std::sync::Arc;

use serde::Serialize;

use super::cycle::CycleKind;
use super::{CycleGuard, CycleTask, Orchestrator};
use crate::application::commands::{RunBatch, StartAutoPilot};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BatchConfirmationPort, ConsistencyWarning, GenerationError, GenerationRequest, SessionEvent,
};
use crate::application::prompts::{self, CHAOS_CONTEXT_CHARS};
use crate::application::session::{BatchProgress, Phase};
use crate::domain::manuscript::{Beat, Chapter, Choice, PacingScore, Placement};

/// 混沌转折取最近几章的结尾
const CHAOS_RECENT_CHAPTERS: usize = 3;

/// 批量生成结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub completed: usize,
    pub total: usize,
    /// 是否因一致性警告被用户中止
    pub aborted: bool,
    pub chapter_ids: Vec<u32>,
}

impl Orchestrator {
    /// 启动自动驾驶：共运行 count + 1 个周期，或直到原稿耗尽
    pub fn start_auto_pilot(
        self: &Arc<Self>,
        command: StartAutoPilot,
    ) -> Result<CycleTask<Phase>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("start_auto_pilot", &[Phase::Decision, Phase::RefinementSelection])?;
        if command.count == 0 {
            return Err(ApplicationError::validation("auto-pilot count must be positive"));
        }

        let choice = {
            let mut session = self.lock();
            if !session.has_remaining_chunks() {
                return Err(ApplicationError::validation("no source chunks remain"));
            }
            session.start_auto_pilot(command.count);
            session.auto_pilot_opening_choice()
        };
        tracing::info!(count = command.count, choice = %choice, "Auto-pilot started");
        self.publish(SessionEvent::AutoPilot {
            remaining: command.count,
            active: true,
        });

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.run_interactive(
                "auto_pilot",
                CycleKind::Continuation {
                    choice,
                    instructions: String::new(),
                    placement: Placement::NewChapter,
                },
            )
            .await
        }))
    }

    /// 停止自动驾驶；正在运行的周期会完成，之后不再继续
    pub fn stop_auto_pilot(&self) {
        let was_active = {
            let mut session = self.lock();
            let was_active = session.is_auto_pilot_active();
            session.stop_auto_pilot();
            was_active
        };
        if was_active {
            tracing::info!("Auto-pilot stopped by user");
            self.publish(SessionEvent::AutoPilot {
                remaining: 0,
                active: false,
            });
        }
    }

    /// 按选中的情节点顺序批量生成章节
    ///
    /// 每个情节点先做一致性检查，被标记时等待确认；拒绝则中止剩余情节点。
    /// 生成失败同样中止，已提交的章节保留。
    pub fn run_batch(
        self: &Arc<Self>,
        command: RunBatch,
        confirmation: Arc<dyn BatchConfirmationPort>,
    ) -> Result<CycleTask<BatchReport>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("run_batch", &[Phase::Decision, Phase::RefinementSelection])?;
        if command.beat_ids.is_empty() {
            return Err(ApplicationError::validation("select at least one beat"));
        }

        let (metadata, beats) = {
            let session = self.lock();
            let metadata = session
                .metadata()
                .cloned()
                .ok_or_else(|| ApplicationError::not_found("Metadata", "current"))?;
            let beats = command
                .beat_ids
                .iter()
                .map(|id| {
                    metadata
                        .beat_sheet
                        .iter()
                        .find(|b| &b.id == id)
                        .cloned()
                        .ok_or_else(|| ApplicationError::not_found("Beat", id))
                })
                .collect::<Result<Vec<Beat>, _>>()?;
            (metadata, beats)
        };

        let total = beats.len();
        self.lock().set_batch(Some(BatchProgress {
            completed: 0,
            total,
            current_beat: None,
        }));
        self.enter_phase(Phase::Processing);
        tracing::info!(total, "Batch generation started");

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            let mut report = BatchReport {
                completed: 0,
                total,
                aborted: false,
                chapter_ids: Vec::new(),
            };

            for beat in &beats {
                this.update_batch(report.completed, total, Some(beat.id.clone()));

                if !this.check_beat(beat, confirmation.as_ref()).await {
                    tracing::info!(beat_id = %beat.id, "Batch aborted after consistency warning");
                    report.aborted = true;
                    break;
                }

                this.set_status(format!("Batch: writing beat {} ({}/{total})", beat.id, report.completed + 1));
                let prompt = prompts::beat_prompt(
                    metadata.style_dna(),
                    metadata.beats_before(&beat.id),
                    beat,
                );
                let request = GenerationRequest::new(&this.settings.models.drafting_model, prompt);
                let prose = match this.stream_into_display(request).await {
                    Ok(raw) => raw.trim().to_string(),
                    Err(e) => {
                        this.fail_cycle("run_batch", &e);
                        return Err(e);
                    }
                };

                let chapter_id = match this.commit_beat_chapter(beat, prose.clone()) {
                    Ok(id) => id,
                    Err(e) => {
                        this.fail_cycle("run_batch", &e);
                        return Err(e);
                    }
                };
                report.completed += 1;
                report.chapter_ids.push(chapter_id);
                this.publish_commit(chapter_id);
                this.maybe_extract_lore(metadata.auto_lore(), &prose);
            }

            this.update_batch(report.completed, total, None);
            this.lock().set_batch(None);
            tracing::info!(
                completed = report.completed,
                total,
                aborted = report.aborted,
                "Batch generation finished"
            );
            this.set_status(if report.aborted {
                format!("Batch stopped: {}/{total} beats written", report.completed)
            } else {
                format!("Batch complete: {total} beats written")
            });
            this.enter_phase(Phase::Decision);
            Ok(report)
        }))
    }

    /// 一致性检查；被标记时发布警告并等待确认
    async fn check_beat(&self, beat: &Beat, confirmation: &dyn BatchConfirmationPort) -> bool {
        self.set_status(format!("Checking consistency of beat {}...", beat.id));
        let store = self.knowledge.snapshot().await;
        let report = self
            .extraction
            .check_consistency(beat, store.lore(), store.characters())
            .await;
        if !report.is_flagged() {
            return true;
        }

        tracing::warn!(beat_id = %beat.id, issues = report.issues.len(), "Consistency warning");
        let warning = ConsistencyWarning {
            beat: beat.clone(),
            issues: report.issues,
        };
        self.publish(SessionEvent::ConsistencyWarning {
            beat_id: warning.beat.id.clone(),
            description: warning.beat.description.clone(),
            issues: warning.issues.clone(),
        });
        confirmation.confirm(&warning).await
    }

    /// 批量章节不消费原稿，也不计入交互节奏计数
    fn commit_beat_chapter(&self, beat: &Beat, prose: String) -> Result<u32, ApplicationError> {
        if prose.is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }
        let mut session = self.lock();
        let chapter_id = session.manuscript().next_id();
        let chapter = Chapter::new(
            chapter_id,
            format!("Chapter {chapter_id} (Beat {})", beat.id),
            vec![prose],
            PacingScore::default(),
        )?;
        session.commit_chapter(chapter, false);
        Ok(chapter_id)
    }

    fn update_batch(&self, completed: usize, total: usize, current_beat: Option<String>) {
        let progress = BatchProgress {
            completed,
            total,
            current_beat,
        };
        self.lock().set_batch(Some(progress.clone()));
        self.publish(SessionEvent::BatchProgress(progress));
    }

    /// 生成一个混沌转折并插到选项最前面，不改变阶段
    pub fn inject_chaos(self: &Arc<Self>) -> Result<CycleTask<Choice>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("inject_chaos", &[Phase::Decision, Phase::RefinementSelection])?;
        let (context, config) = {
            let session = self.lock();
            if session.manuscript().is_empty() {
                return Err(ApplicationError::not_found("Chapter", "latest"));
            }
            (
                session
                    .manuscript()
                    .recent_tail(CHAOS_RECENT_CHAPTERS, CHAOS_CONTEXT_CHARS),
                session.config().cloned(),
            )
        };

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Summoning chaos...");
            let choice = this.extraction.chaos_twist(&context, config.as_ref()).await;
            this.lock().prepend_choice(choice.clone());
            tracing::info!(text = %choice.text, "Chaos twist injected");
            this.publish_choices();
            this.set_status("Chaos twist added");
            Ok(choice)
        }))
    }
}

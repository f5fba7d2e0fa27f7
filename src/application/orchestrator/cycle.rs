//! 核心生成周期
//!
//! 一个周期：构造提示词 → 流式生成 → 解析 → （可选）自我批评润色 → 提交章节。
//! 周期内的任何失败都不会提交章节，并把会话带回 Decision。

use std::sync::Arc;

use super::{CycleGuard, CycleTask, Orchestrator};
use crate::application::commands::Decide;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationError, GenerationRequest, SessionEvent};
use crate::application::prompts::{self, ContinuationInput};
use crate::application::session::Phase;
use crate::domain::manuscript::{Chapter, Choice, GenerationConfig, NovelMetadata, Placement};
use crate::domain::response_parser::parse_response;

/// 润色结果的最小长度，短于它视为失败并保留初稿
const MIN_POLISHED_CHARS: usize = 100;

/// 自动驾驶续写时附带的说明
pub(super) const AUTO_PILOT_INSTRUCTIONS: &str = "Auto-pilot continuation";

/// 周期类型
#[derive(Debug, Clone)]
pub(super) enum CycleKind {
    /// 第一章
    Opening,
    /// 按选项续写下一块原稿
    Continuation {
        choice: String,
        instructions: String,
        placement: Placement,
    },
    /// 缓冲章节：复用当前块，临时放慢节奏，不消费原稿
    BreathingRoom { instructions: String },
}

struct CyclePlan {
    metadata: NovelMetadata,
    /// 本周期实际使用的参数（缓冲章节为覆盖后的参数）
    config: Option<GenerationConfig>,
    /// 会话中的参数是否属于高能量节奏
    high_energy: bool,
    chunk: String,
    history: String,
    consumes_chunk: bool,
    first_chapter: bool,
}

impl Orchestrator {
    /// 选择方向并运行下一个周期
    ///
    /// 原稿已经用完时直接进入 Finished。
    pub fn decide(self: &Arc<Self>, command: Decide) -> Result<CycleTask<Phase>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("decide", &[Phase::Decision, Phase::RefinementSelection])?;

        if command.choice.trim().is_empty() && command.instructions.trim().is_empty() {
            return Err(ApplicationError::validation(
                "either a choice or custom instructions are required",
            ));
        }

        let breathing = Choice::is_breathing_room_text(&command.choice);
        let exhausted = !self.lock().has_remaining_chunks();
        if exhausted && !breathing {
            drop(guard);
            tracing::info!("No source chunks remain, session finished");
            self.set_status("Source material exhausted");
            self.enter_phase(Phase::Finished);
            return Ok(Box::pin(std::future::ready(Ok(Phase::Finished))));
        }

        let kind = if breathing {
            CycleKind::BreathingRoom {
                instructions: command.instructions,
            }
        } else {
            CycleKind::Continuation {
                choice: command.choice,
                instructions: command.instructions,
                placement: command.placement,
            }
        };

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.run_interactive("decide", kind).await
        }))
    }

    /// 运行交互周期；自动驾驶激活时在这里循环，直到计数用完或原稿耗尽
    pub(super) async fn run_interactive(
        &self,
        operation: &'static str,
        first: CycleKind,
    ) -> Result<Phase, ApplicationError> {
        let mut kind = first;
        loop {
            if let Err(e) = self.run_cycle(&kind).await {
                self.fail_cycle(operation, &e);
                return Err(e);
            }

            let (was_active, continues, remaining, exhausted) = {
                let mut session = self.lock();
                let was_active = session.is_auto_pilot_active();
                let continues = session.take_auto_pilot_step();
                (
                    was_active,
                    continues,
                    session.auto_pilot_remaining(),
                    !session.has_remaining_chunks(),
                )
            };

            if !continues {
                if was_active {
                    tracing::info!("Auto-pilot finished");
                    self.publish(SessionEvent::AutoPilot {
                        remaining: 0,
                        active: false,
                    });
                }
                self.enter_phase(Phase::Decision);
                return Ok(Phase::Decision);
            }

            if exhausted {
                tracing::info!("Auto-pilot stopped, source material exhausted");
                self.lock().stop_auto_pilot();
                self.publish(SessionEvent::AutoPilot {
                    remaining: 0,
                    active: false,
                });
                self.set_status("Source material exhausted");
                self.enter_phase(Phase::Finished);
                return Ok(Phase::Finished);
            }

            self.publish(SessionEvent::AutoPilot {
                remaining,
                active: true,
            });
            let choice = self.lock().auto_pilot_next_choice();
            tracing::info!(remaining, choice = %choice, "Auto-pilot scheduling next cycle");
            self.set_status(format!("Auto-pilot: {remaining} cycles remaining"));

            tokio::time::sleep(self.settings.auto_pilot_delay).await;

            let still_active = self.lock().is_auto_pilot_active();
            if !still_active {
                tracing::info!("Auto-pilot stopped during delay");
                self.enter_phase(Phase::Decision);
                return Ok(Phase::Decision);
            }

            kind = CycleKind::Continuation {
                choice,
                instructions: AUTO_PILOT_INSTRUCTIONS.to_string(),
                placement: Placement::NewChapter,
            };
        }
    }

    fn plan_cycle(&self, kind: &CycleKind) -> Result<CyclePlan, ApplicationError> {
        let session = self.lock();
        let metadata = session
            .metadata()
            .cloned()
            .ok_or_else(|| ApplicationError::not_found("Metadata", "current"))?;
        let config = session.config().cloned();
        let high_energy = config.as_ref().is_some_and(GenerationConfig::is_high_energy);

        let (chunk, consumes_chunk, config) = match kind {
            CycleKind::Opening | CycleKind::Continuation { .. } => {
                let chunk = session
                    .next_chunk()
                    .ok_or_else(|| ApplicationError::validation("no source chunks remain"))?;
                (chunk.to_string(), true, config)
            }
            CycleKind::BreathingRoom { .. } => {
                let slowed = config.unwrap_or_default().breathing_room_override();
                (session.current_chunk().to_string(), false, Some(slowed))
            }
        };

        Ok(CyclePlan {
            metadata,
            config,
            high_energy,
            chunk,
            history: session.manuscript().full_text(),
            consumes_chunk,
            first_chapter: session.manuscript().is_empty(),
        })
    }

    async fn build_request(&self, kind: &CycleKind, plan: &CyclePlan) -> GenerationRequest {
        let prompt = match kind {
            CycleKind::Opening => prompts::setup_prompt(&plan.metadata, plan.config.as_ref(), &plan.chunk),
            CycleKind::Continuation {
                choice,
                instructions,
                placement,
            } => {
                self.continuation(plan, choice, instructions, *placement)
                    .await
            }
            CycleKind::BreathingRoom { instructions } => {
                let instructions = prompts::interlude_instructions(instructions);
                self.continuation(plan, prompts::INTERLUDE_CHOICE, &instructions, Placement::NewChapter)
                    .await
            }
        };
        GenerationRequest::new(&self.settings.models.drafting_model, prompt)
            .with_system_instruction(prompts::system_prompt())
    }

    async fn continuation(
        &self,
        plan: &CyclePlan,
        choice: &str,
        instructions: &str,
        placement: Placement,
    ) -> String {
        let retrieved = self
            .knowledge
            .retrieve_context(&format!("{} {}", plan.chunk, choice))
            .await;
        let input = ContinuationInput {
            config: plan.config.as_ref(),
            style_dna: plan.metadata.style_dna(),
            history: &plan.history,
            retrieved: &retrieved,
            placement,
            choice,
            instructions,
            chunk: &plan.chunk,
        };
        prompts::continuation_prompt(&input, &self.window)
    }

    /// 运行单个周期并提交章节
    async fn run_cycle(&self, kind: &CycleKind) -> Result<u32, ApplicationError> {
        let plan = self.plan_cycle(kind)?;
        self.enter_phase(Phase::Processing);
        self.set_status(match kind {
            CycleKind::Opening => "Drafting the opening chapter...",
            CycleKind::Continuation { .. } => "Expanding the next segment...",
            CycleKind::BreathingRoom { .. } => "Writing a breathing-room interlude...",
        });

        let request = self.build_request(kind, &plan).await;
        let raw = self.stream_into_display(request).await?;
        let parsed = parse_response(&raw);
        if parsed.prose.is_empty() {
            return Err(GenerationError::InvalidResponse("response contained no prose".to_string()).into());
        }
        if parsed.degraded {
            tracing::warn!("Structured part missing or malformed, using fallback choice");
        }

        let mut versions = vec![parsed.prose.clone()];
        if plan.metadata.auto_critique() && !plan.first_chapter {
            if let Some(polished) = self
                .auto_polish(&parsed.prose, plan.metadata.style_dna(), &plan.history)
                .await
            {
                versions.push(polished);
            }
        }

        let breathing = matches!(kind, CycleKind::BreathingRoom { .. });
        let (chapter_id, escalated, content) = {
            let mut session = self.lock();
            let chapter_id = session.manuscript().next_id();
            let chapter = Chapter::new(
                chapter_id,
                format!("Chapter {chapter_id}"),
                versions,
                parsed.pacing_score,
            )?;
            let content = chapter.content().to_string();
            session.commit_chapter(chapter, plan.consumes_chunk);

            let escalated = if breathing {
                session.reset_pacing_streak();
                false
            } else {
                session.record_cycle_pacing(plan.high_energy)
            };
            session.replace_choices(parsed.choices);
            if escalated {
                session.prepend_choice(Choice::breathing_room());
            }
            session.set_last_error(None);
            (chapter_id, escalated, content)
        };

        tracing::info!(
            chapter_id,
            pacing_score = parsed.pacing_score.value(),
            escalated,
            "Chapter committed"
        );
        self.publish_commit(chapter_id);
        self.publish_choices();
        self.set_status(format!("Chapter {chapter_id} committed"));
        self.maybe_extract_lore(plan.metadata.auto_lore(), &content);

        Ok(chapter_id)
    }

    /// 自我批评后润色；任何失败都保留初稿
    async fn auto_polish(&self, draft: &str, style_dna: &str, history: &str) -> Option<String> {
        self.set_status("Self-critiquing draft...");
        let points = self.extraction.critique(draft).await;
        if points.is_empty() {
            tracing::debug!("Critique found nothing to fix");
            return None;
        }

        let comments: Vec<String> = points.into_iter().map(|p| p.comment).collect();
        let instructions = prompts::critique_fix_instructions(&comments);
        let prompt = prompts::refinement_prompt(draft, &instructions, style_dna, history, &self.window);
        let request = GenerationRequest::new(&self.settings.models.drafting_model, prompt);

        self.set_status("Polishing draft...");
        match self.generator.generate_once(request).await {
            Ok(text) if text.trim().chars().count() > MIN_POLISHED_CHARS => {
                tracing::info!(issues = comments.len(), "Draft polished after critique");
                Some(text.trim().to_string())
            }
            Ok(_) => {
                tracing::warn!("Polished text too short, keeping draft");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Auto-polish failed, keeping draft");
                None
            }
        }
    }
}

//! 精修流程：RefinementSelection → Refining → Decision

use std::sync::Arc;

use super::{CycleGuard, CycleTask, Orchestrator};
use crate::application::commands::Refine;
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationError, GenerationRequest, SessionEvent};
use crate::application::prompts;
use crate::application::session::Phase;
use crate::domain::response_parser::visible_projection;

impl Orchestrator {
    /// 进入精修选择
    pub fn enter_refinement(&self) -> Result<(), ApplicationError> {
        self.ensure_idle()?;
        self.require_phase("enter_refinement", &[Phase::Decision])?;
        if self.lock().manuscript().is_empty() {
            return Err(ApplicationError::not_found("Chapter", "latest"));
        }
        self.enter_phase(Phase::RefinementSelection);
        Ok(())
    }

    /// 按选中的精修指令重写最新章节
    ///
    /// 没有选中任何已知指令时直接回到 Decision。失败时章节保持不变。
    pub fn refine(self: &Arc<Self>, command: Refine) -> Result<CycleTask<Phase>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("refine", &[Phase::RefinementSelection, Phase::Decision])?;

        let instructions = prompts::directive_instructions(&command.directives);
        if instructions.is_empty() {
            drop(guard);
            self.enter_phase(Phase::Decision);
            return Ok(Box::pin(std::future::ready(Ok(Phase::Decision))));
        }

        let (chapter_id, chapter_text, style_dna, history) = {
            let session = self.lock();
            let latest = session
                .manuscript()
                .latest()
                .ok_or_else(|| ApplicationError::not_found("Chapter", "latest"))?;
            let style_dna = session
                .metadata()
                .map(|m| m.style_dna().to_string())
                .unwrap_or_default();
            (
                latest.id(),
                latest.content().to_string(),
                style_dna,
                session.manuscript().text_before_latest(),
            )
        };
        self.enter_phase(Phase::Refining);

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Refining chapter...");
            let prompt = prompts::refinement_prompt(
                &chapter_text,
                &instructions,
                &style_dna,
                &history,
                &this.window,
            );
            let request = GenerationRequest::new(&this.settings.models.drafting_model, prompt);

            let refined = match this.stream_into_display(request).await {
                Ok(raw) => visible_projection(&raw).trim().to_string(),
                Err(e) => {
                    this.fail_cycle("refine", &e);
                    return Err(e);
                }
            };
            if refined.is_empty() {
                let e = ApplicationError::from(GenerationError::EmptyResponse);
                this.fail_cycle("refine", &e);
                return Err(e);
            }

            let committed = {
                let mut session = this.lock();
                session.manuscript_mut().chapter_mut(chapter_id).map(|chapter| {
                    chapter.push_version(refined);
                    chapter.current_version()
                })
            };
            let current_version = match committed {
                Ok(version) => version,
                Err(e) => {
                    let e = ApplicationError::from(e);
                    this.fail_cycle("refine", &e);
                    return Err(e);
                }
            };

            tracing::info!(chapter_id, current_version, "Chapter refined");
            this.publish(SessionEvent::ChapterUpdated {
                chapter_id,
                current_version,
            });
            this.set_status(format!("Chapter {chapter_id} refined"));
            this.enter_phase(Phase::Decision);
            Ok(Phase::Decision)
        }))
    }
}

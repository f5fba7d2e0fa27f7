//! 开篇流程：上传 → 元数据 → 参数 → 大纲 → 文风分析 → 第一章

use std::sync::Arc;

use super::cycle::CycleKind;
use super::{CycleGuard, CycleTask, Orchestrator};
use crate::application::commands::{ConfirmBeats, LoadManuscript, SubmitConfiguration, SubmitMetadata};
use crate::application::error::ApplicationError;
use crate::application::session::Phase;
use crate::domain::manuscript::{Beat, DetectedMetadata};
use crate::domain::split_into_source_chunks;

impl Orchestrator {
    /// 载入原稿：切块后识别元数据，结束时进入 Setup
    ///
    /// 元数据识别失败不会阻塞，返回空的识别结果。
    pub fn load_manuscript(
        self: &Arc<Self>,
        command: LoadManuscript,
    ) -> Result<CycleTask<DetectedMetadata>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("load_manuscript", &[Phase::Upload, Phase::Setup])?;

        let chunks = split_into_source_chunks(&command.text, &self.settings.chunking);
        if chunks.is_empty() {
            return Err(ApplicationError::validation("manuscript text is empty"));
        }
        tracing::info!(chunks = chunks.len(), "Manuscript loaded");
        self.lock().load_chunks(chunks);
        self.enter_phase(Phase::DetectingMetadata);

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Detecting manuscript metadata...");
            let detected = this.extraction.detect_metadata(&command.text).await;
            this.lock().set_detected(detected.clone());
            this.set_status("Metadata detected");
            this.enter_phase(Phase::Setup);
            Ok(detected)
        }))
    }

    /// 提交项目元数据，进入 Configuration
    pub fn submit_metadata(&self, command: SubmitMetadata) -> Result<(), ApplicationError> {
        self.ensure_idle()?;
        self.require_phase("submit_metadata", &[Phase::Setup, Phase::Configuration])?;
        if command.metadata.title.trim().is_empty() {
            return Err(ApplicationError::validation("title must not be empty"));
        }
        let metadata = command.metadata;
        if metadata.min_word_count > metadata.max_word_count && metadata.max_word_count > 0 {
            return Err(ApplicationError::validation(
                "minimum word count exceeds maximum word count",
            ));
        }

        tracing::info!(title = %metadata.title, "Metadata submitted");
        self.lock().set_metadata(metadata);
        self.enter_phase(Phase::Configuration);
        Ok(())
    }

    /// 提交生成参数并生成大纲，结束时进入 BeatSheet
    pub fn submit_configuration(
        self: &Arc<Self>,
        command: SubmitConfiguration,
    ) -> Result<CycleTask<Vec<Beat>>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("submit_configuration", &[Phase::Configuration])?;

        let (title, text) = {
            let mut session = self.lock();
            let text = session.source_chunks().concat();
            let metadata = session
                .metadata_mut()
                .ok_or_else(|| ApplicationError::not_found("Metadata", "current"))?;
            metadata.config = Some(command.config);
            (metadata.title.clone(), text)
        };
        self.enter_phase(Phase::GeneratingBeats);

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Generating beat sheet...");
            let beats = this.extraction.beat_sheet(&title, &text).await;
            tracing::info!(beats = beats.len(), "Beat sheet ready");
            if let Some(metadata) = this.lock().metadata_mut() {
                metadata.beat_sheet = beats.clone();
            }
            this.set_status("Beat sheet ready");
            this.enter_phase(Phase::BeatSheet);
            Ok(beats)
        }))
    }

    /// 确认大纲：分析文风后生成第一章
    ///
    /// 文风只在这里分析一次，之后的所有提示词原样复用。
    pub fn confirm_beats(self: &Arc<Self>, command: ConfirmBeats) -> Result<CycleTask<Phase>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        self.require_phase("confirm_beats", &[Phase::BeatSheet])?;
        if command.beats.is_empty() {
            return Err(ApplicationError::validation("beat sheet must contain at least one beat"));
        }

        let sample = {
            let mut session = self.lock();
            let sample = session.source_chunks().first().cloned().unwrap_or_default();
            let metadata = session
                .metadata_mut()
                .ok_or_else(|| ApplicationError::not_found("Metadata", "current"))?;
            metadata.beat_sheet = command.beats;
            sample
        };
        self.enter_phase(Phase::Analyzing);

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Analyzing style DNA...");
            let style = this.extraction.analyze_style(&sample).await;
            if let Some(metadata) = this.lock().metadata_mut() {
                metadata.style_dna = Some(style);
            }
            this.run_interactive("confirm_beats", CycleKind::Opening).await
        }))
    }
}

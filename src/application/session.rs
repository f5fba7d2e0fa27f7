//! 会话状态
//!
//! 单会话、进程内的全部可变状态。这里只放同步的状态迁移逻辑，
//! 异步编排在 orchestrator 中完成；编排器持锁期间从不跨越 await。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::knowledge::{CharacterStatus, LoreEntry};
use crate::domain::manuscript::{
    Chapter, Choice, ChoiceType, DetectedMetadata, GenerationConfig, Manuscript, NovelMetadata,
};
use crate::domain::response_parser::{strip_markup, visible_projection};
use crate::domain::{ProjectState, SessionAnalytics};

/// 连续多少个高能量周期后插入缓冲章节
pub const PACING_ESCALATION_THRESHOLD: u32 = 3;

/// 自动驾驶默认的续写文本
pub const DEFAULT_AUTO_CHOICE: &str = "Continue story naturally.";

/// 创作流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Upload,
    DetectingMetadata,
    Setup,
    Configuration,
    GeneratingBeats,
    BeatSheet,
    Analyzing,
    Processing,
    RefinementSelection,
    Refining,
    Decision,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Upload => "UPLOAD",
            Phase::DetectingMetadata => "DETECTING_METADATA",
            Phase::Setup => "SETUP",
            Phase::Configuration => "CONFIGURATION",
            Phase::GeneratingBeats => "GENERATING_BEATS",
            Phase::BeatSheet => "BEAT_SHEET",
            Phase::Analyzing => "ANALYZING",
            Phase::Processing => "PROCESSING",
            Phase::RefinementSelection => "REFINEMENT_SELECTION",
            Phase::Refining => "REFINING",
            Phase::Decision => "DECISION",
            Phase::Finished => "FINISHED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 流式显示状态
///
/// raw 保存完整原始文本（已去除标签），可见部分截断到分隔符之前。
/// 可见部分只会增长，因此可以按增量推送。
/// 片段末尾未闭合的 `<...` 暂存到下一个片段到达，跨片段的标签也能完整去除。
#[derive(Debug, Clone, Default)]
pub struct StreamingDisplay {
    raw: String,
    pending: String,
    visible_len: usize,
}

/// 暂存的未闭合标签超过这个长度时按普通文本处理
const MAX_PENDING_TAG: usize = 256;

impl StreamingDisplay {
    pub fn reset(&mut self) {
        self.raw.clear();
        self.pending.clear();
        self.visible_len = 0;
    }

    /// 追加片段（先去除标签），返回新增的可见文本
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.pending.push_str(fragment);
        let open_tag = self
            .pending
            .rfind('<')
            .filter(|&idx| !self.pending[idx..].contains('>'))
            .filter(|&idx| self.pending.len() - idx <= MAX_PENDING_TAG);

        let ready = match open_tag {
            Some(idx) => {
                let tail = self.pending.split_off(idx);
                std::mem::replace(&mut self.pending, tail)
            }
            None => std::mem::take(&mut self.pending),
        };
        self.raw.push_str(&strip_markup(&ready));
        self.advance()
    }

    /// 流结束：清空暂存内容，返回新增的可见文本
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        self.raw.push_str(&strip_markup(&rest));
        self.advance()
    }

    fn advance(&mut self) -> Option<String> {
        let visible = visible_projection(&self.raw);
        if visible.len() > self.visible_len {
            let delta = visible[self.visible_len..].to_string();
            self.visible_len = visible.len();
            Some(delta)
        } else {
            None
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn visible(&self) -> &str {
        &self.raw[..self.visible_len]
    }
}

/// 批量生成进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub current_beat: Option<String>,
}

/// 章节提交记录，撤销时据此恢复游标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommitRecord {
    chapter_id: u32,
    cursor_before: usize,
    pacing_streak_before: u32,
}

/// 会话
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    source_chunks: Vec<String>,
    /// 已消费的源文本块数量
    cursor: usize,
    metadata: Option<NovelMetadata>,
    detected: DetectedMetadata,
    manuscript: Manuscript,
    choices: Vec<Choice>,
    streaming: StreamingDisplay,
    status: String,
    pacing_streak: u32,
    auto_pilot: Option<u32>,
    batch: Option<BatchProgress>,
    analytics: SessionAnalytics,
    commit_log: Vec<CommitRecord>,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Upload,
            source_chunks: Vec::new(),
            cursor: 0,
            metadata: None,
            detected: DetectedMetadata::default(),
            manuscript: Manuscript::new(),
            choices: Vec::new(),
            streaming: StreamingDisplay::default(),
            status: String::new(),
            pacing_streak: 0,
            auto_pilot: None,
            batch: None,
            analytics: SessionAnalytics::default(),
            commit_log: Vec::new(),
            last_saved: None,
            last_error: None,
        }
    }

    // ---- 阶段 ----

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    // ---- 源文本 ----

    pub fn load_chunks(&mut self, chunks: Vec<String>) {
        self.source_chunks = chunks;
        self.cursor = 0;
    }

    pub fn source_chunks(&self) -> &[String] {
        &self.source_chunks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_remaining_chunks(&self) -> bool {
        self.cursor < self.source_chunks.len()
    }

    /// 下一个待消费的源文本块
    pub fn next_chunk(&self) -> Option<&str> {
        self.source_chunks.get(self.cursor).map(String::as_str)
    }

    /// 最近消费的源文本块（缓冲章节复用它）
    pub fn current_chunk(&self) -> &str {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.source_chunks.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    }

    // ---- 元数据 ----

    pub fn metadata(&self) -> Option<&NovelMetadata> {
        self.metadata.as_ref()
    }

    pub fn metadata_mut(&mut self) -> Option<&mut NovelMetadata> {
        self.metadata.as_mut()
    }

    pub fn set_metadata(&mut self, metadata: NovelMetadata) {
        self.metadata = Some(metadata);
    }

    pub fn config(&self) -> Option<&GenerationConfig> {
        self.metadata.as_ref().and_then(|m| m.config.as_ref())
    }

    pub fn detected(&self) -> &DetectedMetadata {
        &self.detected
    }

    pub fn set_detected(&mut self, detected: DetectedMetadata) {
        self.detected = detected;
    }

    // ---- 章节 ----

    pub fn manuscript(&self) -> &Manuscript {
        &self.manuscript
    }

    pub fn manuscript_mut(&mut self) -> &mut Manuscript {
        &mut self.manuscript
    }

    /// 提交章节
    ///
    /// consumes_chunk 为 true 时游标前进一格；记录提交前的游标供撤销使用。
    pub fn commit_chapter(&mut self, chapter: Chapter, consumes_chunk: bool) {
        self.commit_log.push(CommitRecord {
            chapter_id: chapter.id(),
            cursor_before: self.cursor,
            pacing_streak_before: self.pacing_streak,
        });
        if consumes_chunk {
            self.cursor = (self.cursor + 1).min(self.source_chunks.len());
        }
        self.analytics
            .record_words(crate::domain::count_words(chapter.content()));
        self.manuscript.commit(chapter);
    }

    /// 撤销最后一章，恢复提交前的游标，取消自动驾驶
    pub fn undo_last_chapter(&mut self) -> Option<Chapter> {
        let popped = self.manuscript.pop_last()?;
        if let Some(pos) = self
            .commit_log
            .iter()
            .rposition(|r| r.chapter_id == popped.id())
        {
            let record = self.commit_log.remove(pos);
            self.cursor = record.cursor_before;
            self.pacing_streak = record.pacing_streak_before;
        }
        self.auto_pilot = None;
        self.phase = if self.manuscript.is_empty() {
            Phase::Setup
        } else {
            Phase::Decision
        };
        Some(popped)
    }

    // ---- 选项与节奏 ----

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// 整体替换选项列表
    pub fn replace_choices(&mut self, choices: Vec<Choice>) {
        self.choices = choices;
    }

    pub fn prepend_choice(&mut self, choice: Choice) {
        self.choices.insert(0, choice);
    }

    pub fn pacing_streak(&self) -> u32 {
        self.pacing_streak
    }

    /// 记录一个交互周期的节奏设置，返回是否达到升级阈值
    pub fn record_cycle_pacing(&mut self, high_energy: bool) -> bool {
        if high_energy {
            self.pacing_streak += 1;
        } else {
            self.pacing_streak = 0;
        }
        self.pacing_streak >= PACING_ESCALATION_THRESHOLD
    }

    pub fn reset_pacing_streak(&mut self) {
        self.pacing_streak = 0;
    }

    // ---- 自动驾驶 ----

    pub fn auto_pilot_remaining(&self) -> u32 {
        self.auto_pilot.unwrap_or(0)
    }

    pub fn is_auto_pilot_active(&self) -> bool {
        self.auto_pilot.is_some()
    }

    pub fn start_auto_pilot(&mut self, count: u32) {
        self.auto_pilot = Some(count);
    }

    pub fn stop_auto_pilot(&mut self) {
        self.auto_pilot = None;
    }

    /// 周期结束时调用：计数为正则减一并返回 true，否则结束自动驾驶
    pub fn take_auto_pilot_step(&mut self) -> bool {
        match self.auto_pilot {
            Some(remaining) if remaining > 0 => {
                self.auto_pilot = Some(remaining - 1);
                true
            }
            _ => {
                self.auto_pilot = None;
                false
            }
        }
    }

    /// 自动驾驶第一步使用的选项：含 "Continue" 的选项，否则第一个
    pub fn auto_pilot_opening_choice(&self) -> String {
        self.choices
            .iter()
            .find(|c| c.text.contains("Continue"))
            .or_else(|| self.choices.first())
            .map(|c| c.text.clone())
            .unwrap_or_else(|| DEFAULT_AUTO_CHOICE.to_string())
    }

    /// 自动驾驶后续使用的选项：第一个非节奏选项，否则第一个
    pub fn auto_pilot_next_choice(&self) -> String {
        self.choices
            .iter()
            .find(|c| c.kind != ChoiceType::Pacing)
            .or_else(|| self.choices.first())
            .map(|c| c.text.clone())
            .unwrap_or_else(|| DEFAULT_AUTO_CHOICE.to_string())
    }

    // ---- 批量 ----

    pub fn batch(&self) -> Option<&BatchProgress> {
        self.batch.as_ref()
    }

    pub fn set_batch(&mut self, batch: Option<BatchProgress>) {
        self.batch = batch;
    }

    // ---- 流式显示与状态 ----

    pub fn streaming(&self) -> &StreamingDisplay {
        &self.streaming
    }

    pub fn streaming_mut(&mut self) -> &mut StreamingDisplay {
        &mut self.streaming
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    // ---- 统计与快照 ----

    pub fn analytics(&self) -> &SessionAnalytics {
        &self.analytics
    }

    pub fn analytics_mut(&mut self) -> &mut SessionAnalytics {
        &mut self.analytics
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved = Some(at);
    }

    /// 是否满足自动保存条件：有元数据且至少一章
    pub fn is_saveable(&self) -> bool {
        self.metadata.is_some() && !self.manuscript.is_empty()
    }

    /// 完整快照（导出与存档使用）
    pub fn project_state(&self, lore: Vec<LoreEntry>, characters: Vec<CharacterStatus>) -> ProjectState {
        ProjectState {
            metadata: self.metadata.clone().unwrap_or_default(),
            chapters: self.manuscript.chapters().to_vec(),
            lore,
            characters,
            analytics: self.analytics.clone(),
            last_saved: self.last_saved.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::PacingScore;

    fn chapter(id: u32) -> Chapter {
        Chapter::new(id, format!("Chapter {id}"), vec!["one two".to_string()], PacingScore::default())
            .unwrap()
    }

    fn session_with_chunks(n: usize) -> Session {
        let mut session = Session::new();
        session.load_chunks((0..n).map(|i| format!("chunk {i}")).collect());
        session
    }

    #[test]
    fn test_undo_restores_cursor_and_chapters() {
        let mut session = session_with_chunks(3);
        session.commit_chapter(chapter(1), true);
        let chapters_before = session.manuscript().chapters().to_vec();
        let cursor_before = session.cursor();

        session.commit_chapter(chapter(2), true);
        assert_eq!(session.cursor(), 2);

        session.undo_last_chapter().unwrap();
        assert_eq!(session.manuscript().chapters(), chapters_before.as_slice());
        assert_eq!(session.cursor(), cursor_before);
        assert_eq!(session.phase(), Phase::Decision);

        session.undo_last_chapter().unwrap();
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.undo_last_chapter().is_none());
    }

    #[test]
    fn test_commit_without_consuming_chunk() {
        let mut session = session_with_chunks(2);
        session.commit_chapter(chapter(1), true);
        session.commit_chapter(chapter(2), false);

        assert_eq!(session.cursor(), 1);
        assert_eq!(session.current_chunk(), "chunk 0");
        assert_eq!(session.next_chunk(), Some("chunk 1"));
        assert_eq!(session.analytics().words_generated, 4);
    }

    #[test]
    fn test_pacing_streak() {
        let mut session = Session::new();
        assert!(!session.record_cycle_pacing(true));
        assert!(!session.record_cycle_pacing(true));
        assert!(session.record_cycle_pacing(true));
        assert!(session.record_cycle_pacing(true));
        assert!(!session.record_cycle_pacing(false));
        assert_eq!(session.pacing_streak(), 0);
    }

    #[test]
    fn test_auto_pilot_countdown() {
        let mut session = Session::new();
        session.start_auto_pilot(1);
        assert!(session.take_auto_pilot_step());
        assert_eq!(session.auto_pilot_remaining(), 0);
        assert!(session.is_auto_pilot_active());
        assert!(!session.take_auto_pilot_step());
        assert!(!session.is_auto_pilot_active());
    }

    #[test]
    fn test_auto_pilot_choice_selection() {
        let mut session = Session::new();
        assert_eq!(session.auto_pilot_next_choice(), DEFAULT_AUTO_CHOICE);

        session.replace_choices(vec![
            Choice::breathing_room(),
            Choice::new("A", "Flee the city", "", ChoiceType::Subplot),
            Choice::new("B", "Continue the hunt", "", ChoiceType::Other),
        ]);
        assert_eq!(session.auto_pilot_next_choice(), "Flee the city");
        assert_eq!(session.auto_pilot_opening_choice(), "Continue the hunt");
    }

    #[test]
    fn test_streaming_display_hides_structured_tail() {
        let mut display = StreamingDisplay::default();
        assert_eq!(display.push("<b>Rain</b> fell.").as_deref(), Some("Rain fell."));
        assert_eq!(display.push("|||STRAT"), None);
        assert_eq!(display.push("EGIC_SPLIT|||{\"choices\":[]}"), None);
        assert_eq!(display.visible(), "Rain fell.");
        assert!(display.raw().ends_with("[]}"));
    }

    #[test]
    fn test_streaming_display_strips_tag_split_across_fragments() {
        let mut display = StreamingDisplay::default();
        assert_eq!(display.push("Rain<e").as_deref(), Some("Rain"));
        assert_eq!(display.push("m>fell").as_deref(), Some("fell"));
        assert_eq!(display.visible(), "Rainfell");
        assert_eq!(display.raw(), "Rainfell");
    }

    #[test]
    fn test_streaming_display_flushes_unclosed_tail_on_finish() {
        let mut display = StreamingDisplay::default();
        assert_eq!(display.push("Rain fell. <i").as_deref(), Some("Rain fell. "));
        assert_eq!(display.push("ncomplete"), None);
        assert_eq!(display.finish(), None);
        assert_eq!(display.raw(), "Rain fell. ");

        display.reset();
        display.push("a <");
        assert_eq!(display.push(&"b".repeat(MAX_PENDING_TAG)), None);
        assert_eq!(display.raw(), "a ");
    }
}

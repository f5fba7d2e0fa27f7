//! 稿件编辑：撤销、排序、版本切换、手动编辑、查找替换、精确改写

use std::sync::Arc;

use super::{CycleGuard, CycleTask, Orchestrator};
use crate::application::commands::{
    EditChapter, ErasePassage, FindReplace, ReorderChapter, RewritePassage, SelectVersion,
};
use crate::application::error::ApplicationError;
use crate::application::ports::SessionEvent;
use crate::domain::manuscript::ManuscriptError;

impl Orchestrator {
    /// 撤销最后一章：恢复提交前的原稿游标，取消自动驾驶
    pub fn undo(&self) -> Result<u32, ApplicationError> {
        self.ensure_idle()?;
        let (removed, phase) = {
            let mut session = self.lock();
            let removed = session
                .undo_last_chapter()
                .ok_or_else(|| ApplicationError::not_found("Chapter", "latest"))?;
            (removed, session.phase())
        };

        tracing::info!(chapter_id = removed.id(), "Chapter undone");
        self.publish(SessionEvent::ChapterRemoved {
            chapter_id: removed.id(),
        });
        self.publish(SessionEvent::AutoPilot {
            remaining: 0,
            active: false,
        });
        self.publish(SessionEvent::PhaseChanged { phase });
        Ok(removed.id())
    }

    /// 移动章节，边界处不做任何事
    pub fn reorder_chapter(&self, command: ReorderChapter) -> Result<bool, ApplicationError> {
        self.ensure_idle()?;
        let (moved, order) = {
            let mut session = self.lock();
            if command.index >= session.manuscript().len() {
                return Err(ApplicationError::from(
                    ManuscriptError::IndexOutOfRange(command.index),
                ));
            }
            let moved = session
                .manuscript_mut()
                .move_chapter(command.index, command.direction);
            let order: Vec<u32> = session.manuscript().chapters().iter().map(|c| c.id()).collect();
            (moved, order)
        };
        if moved {
            self.publish(SessionEvent::ChaptersReordered { order });
        }
        Ok(moved)
    }

    pub fn select_version(&self, command: SelectVersion) -> Result<(), ApplicationError> {
        self.ensure_idle()?;
        self.lock()
            .manuscript_mut()
            .chapter_mut(command.chapter_id)?
            .select_version(command.version)?;
        self.publish(SessionEvent::ChapterUpdated {
            chapter_id: command.chapter_id,
            current_version: command.version,
        });
        Ok(())
    }

    /// 手动编辑，追加为新版本
    pub fn edit_chapter(&self, command: EditChapter) -> Result<usize, ApplicationError> {
        self.ensure_idle()?;
        let current_version = {
            let mut session = self.lock();
            let chapter = session.manuscript_mut().chapter_mut(command.chapter_id)?;
            if chapter.content() == command.content {
                return Ok(chapter.current_version());
            }
            chapter.push_version(command.content);
            chapter.current_version()
        };
        self.publish(SessionEvent::ChapterUpdated {
            chapter_id: command.chapter_id,
            current_version,
        });
        Ok(current_version)
    }

    /// 全文查找替换，返回被修改的章节数
    pub fn find_replace(&self, command: FindReplace) -> Result<usize, ApplicationError> {
        self.ensure_idle()?;
        if command.find.is_empty() {
            return Err(ApplicationError::validation("search text must not be empty"));
        }
        let (changed, updates) = {
            let mut session = self.lock();
            let changed = session.manuscript_mut().find_replace(&command.find, &command.replace);
            let updates: Vec<(u32, usize)> = session
                .manuscript()
                .chapters()
                .iter()
                .map(|c| (c.id(), c.current_version()))
                .collect();
            (changed, updates)
        };
        tracing::info!(changed, "Find and replace applied");
        if changed > 0 {
            for (chapter_id, current_version) in updates {
                self.publish(SessionEvent::ChapterUpdated {
                    chapter_id,
                    current_version,
                });
            }
        }
        Ok(changed)
    }

    /// 改写选中片段（当前版本中第一次出现的位置），结果作为新版本提交
    pub fn rewrite_passage(
        self: &Arc<Self>,
        command: RewritePassage,
    ) -> Result<CycleTask<String>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        let context = self.passage_context(command.chapter_id, &command.selection)?;

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Rewriting passage...");
            let replacement = this
                .extraction
                .rewrite_passage(&command.selection, &command.instruction, &context)
                .await?;
            this.splice_passage(command.chapter_id, &command.selection, &replacement)
        }))
    }

    /// 删除选中片段，以生成的衔接文本替代
    pub fn erase_passage(
        self: &Arc<Self>,
        command: ErasePassage,
    ) -> Result<CycleTask<String>, ApplicationError> {
        let guard = CycleGuard::acquire(&self.busy)?;
        let context = self.passage_context(command.chapter_id, &command.selection)?;

        let this = self.clone();
        Ok(Box::pin(async move {
            let _guard = guard;
            this.set_status("Removing passage...");
            let bridge = this
                .extraction
                .erase_passage(&command.selection, &context)
                .await?;
            this.splice_passage(command.chapter_id, &command.selection, &bridge)
        }))
    }

    fn passage_context(&self, chapter_id: u32, selection: &str) -> Result<String, ApplicationError> {
        if selection.trim().is_empty() {
            return Err(ApplicationError::validation("selection must not be empty"));
        }
        let session = self.lock();
        let chapter = session
            .manuscript()
            .chapter(chapter_id)
            .ok_or(ManuscriptError::ChapterNotFound(chapter_id))?;
        if !chapter.content().contains(selection) {
            return Err(ManuscriptError::SelectionNotFound(chapter_id).into());
        }
        Ok(chapter.content().to_string())
    }

    fn splice_passage(
        &self,
        chapter_id: u32,
        selection: &str,
        replacement: &str,
    ) -> Result<String, ApplicationError> {
        let (content, current_version) = {
            let mut session = self.lock();
            let chapter = session.manuscript_mut().chapter_mut(chapter_id)?;
            if !chapter.content().contains(selection) {
                return Err(ManuscriptError::SelectionNotFound(chapter_id).into());
            }
            let content = chapter.content().replacen(selection, replacement, 1);
            chapter.push_version(content.clone());
            (content, chapter.current_version())
        };
        tracing::info!(chapter_id, current_version, "Passage edited");
        self.publish(SessionEvent::ChapterUpdated {
            chapter_id,
            current_version,
        });
        self.set_status("Passage updated");
        Ok(content)
    }
}

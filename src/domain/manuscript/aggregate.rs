//! Manuscript Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Chapter, ManuscriptError, MoveDirection};
use crate::domain::context_window::tail_chars;

/// Manuscript 聚合根：按生成顺序排列的章节列表
///
/// 不变量:
/// - 章节按提交顺序追加，重排只交换位置不改 id
/// - 撤销只弹出末尾章节
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manuscript {
    chapters: Vec<Chapter>,
    updated_at: Option<DateTime<Utc>>,
}

impl Manuscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chapters(chapters: Vec<Chapter>) -> Self {
        Self {
            chapters,
            updated_at: Some(Utc::now()),
        }
    }

    /// 下一个章节 id
    pub fn next_id(&self) -> u32 {
        self.chapters.iter().map(Chapter::id).max().unwrap_or(0) + 1
    }

    /// 提交新章节
    pub fn commit(&mut self, chapter: Chapter) {
        self.chapters.push(chapter);
        self.touch();
    }

    /// 撤销最后一章
    pub fn pop_last(&mut self) -> Option<Chapter> {
        let popped = self.chapters.pop();
        if popped.is_some() {
            self.touch();
        }
        popped
    }

    /// 交换相邻章节，越界时不做任何事
    pub fn move_chapter(&mut self, index: usize, direction: MoveDirection) -> bool {
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => index.checked_add(1),
        };
        match target {
            Some(target) if index < self.chapters.len() && target < self.chapters.len() => {
                self.chapters.swap(index, target);
                self.touch();
                true
            }
            _ => false,
        }
    }

    pub fn chapter_mut(&mut self, chapter_id: u32) -> Result<&mut Chapter, ManuscriptError> {
        self.updated_at = Some(Utc::now());
        self.chapters
            .iter_mut()
            .find(|c| c.id() == chapter_id)
            .ok_or(ManuscriptError::ChapterNotFound(chapter_id))
    }

    pub fn chapter(&self, chapter_id: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == chapter_id)
    }

    pub fn latest(&self) -> Option<&Chapter> {
        self.chapters.last()
    }

    pub fn latest_mut(&mut self) -> Option<&mut Chapter> {
        self.updated_at = Some(Utc::now());
        self.chapters.last_mut()
    }

    /// 全文查找替换，返回被修改的章节数
    pub fn find_replace(&mut self, find: &str, replace: &str) -> usize {
        if find.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for chapter in &mut self.chapters {
            if chapter.content().contains(find) {
                let replaced = chapter.content().replace(find, replace);
                chapter.push_version(replaced);
                changed += 1;
            }
        }
        if changed > 0 {
            self.touch();
        }
        changed
    }

    /// 当前累积的全部正文
    pub fn full_text(&self) -> String {
        self.chapters
            .iter()
            .map(Chapter::content)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// 最新一章之前的全部正文
    pub fn text_before_latest(&self) -> String {
        let earlier = &self.chapters[..self.chapters.len().saturating_sub(1)];
        earlier
            .iter()
            .map(Chapter::content)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// 最近几章末尾的文本
    pub fn recent_tail(&self, chapters: usize, max_chars: usize) -> String {
        let start = self.chapters.len().saturating_sub(chapters);
        let joined = self.chapters[start..]
            .iter()
            .map(Chapter::content)
            .collect::<Vec<_>>()
            .join("\n");
        tail_chars(&joined, max_chars).to_string()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::PacingScore;

    fn chapter(id: u32, text: &str) -> Chapter {
        Chapter::new(id, format!("Chapter {id}"), vec![text.to_string()], PacingScore::default())
            .unwrap()
    }

    #[test]
    fn test_commit_and_undo() {
        let mut manuscript = Manuscript::new();
        manuscript.commit(chapter(1, "one"));
        let before = manuscript.chapters().to_vec();

        manuscript.commit(chapter(manuscript.next_id(), "two"));
        assert_eq!(manuscript.len(), 2);

        let popped = manuscript.pop_last().unwrap();
        assert_eq!(popped.id(), 2);
        assert_eq!(manuscript.chapters(), before.as_slice());
    }

    #[test]
    fn test_move_chapter_swaps_without_renumbering() {
        let mut manuscript =
            Manuscript::from_chapters(vec![chapter(1, "a"), chapter(2, "b"), chapter(3, "c")]);

        assert!(manuscript.move_chapter(2, MoveDirection::Up));
        let ids: Vec<u32> = manuscript.chapters().iter().map(Chapter::id).collect();
        assert_eq!(ids, vec![1, 3, 2]);

        assert!(!manuscript.move_chapter(0, MoveDirection::Up));
        assert!(!manuscript.move_chapter(2, MoveDirection::Down));
        assert_eq!(manuscript.next_id(), 4);
    }

    #[test]
    fn test_find_replace_versions_changed_chapters() {
        let mut manuscript =
            Manuscript::from_chapters(vec![chapter(1, "the cat sat"), chapter(2, "a dog ran")]);

        assert_eq!(manuscript.find_replace("cat", "fox"), 1);
        assert_eq!(manuscript.chapters()[0].content(), "the fox sat");
        assert_eq!(manuscript.chapters()[0].history().len(), 2);
        assert_eq!(manuscript.chapters()[1].history().len(), 1);
        assert_eq!(manuscript.find_replace("", "x"), 0);
    }

    #[test]
    fn test_full_text_and_recent_tail() {
        let manuscript =
            Manuscript::from_chapters(vec![chapter(1, "a"), chapter(2, "b"), chapter(3, "c")]);
        assert_eq!(manuscript.full_text(), "a\n\nb\n\nc");
        assert_eq!(manuscript.text_before_latest(), "a\n\nb");
        assert_eq!(Manuscript::new().text_before_latest(), "");
        assert_eq!(manuscript.recent_tail(2, 100), "b\nc");
        assert_eq!(manuscript.recent_tail(3, 1), "c");
    }

    #[test]
    fn test_unknown_chapter() {
        let mut manuscript = Manuscript::new();
        assert!(matches!(
            manuscript.chapter_mut(9),
            Err(ManuscriptError::ChapterNotFound(9))
        ));
    }
}

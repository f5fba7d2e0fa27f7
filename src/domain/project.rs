//! 项目快照
//!
//! 持久化与导出使用的完整、自洽的会话快照。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analytics::SessionAnalytics;
use super::knowledge::{CharacterStatus, LoreEntry};
use super::manuscript::{Chapter, NovelMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub metadata: NovelMetadata,
    pub chapters: Vec<Chapter>,
    pub lore: Vec<LoreEntry>,
    pub characters: Vec<CharacterStatus>,
    pub analytics: SessionAnalytics,
    pub last_saved: DateTime<Utc>,
}

impl ProjectState {
    /// 项目总词数（只统计当前版本）
    pub fn total_words(&self) -> usize {
        self.chapters
            .iter()
            .map(|c| super::text_segmenter::count_words(c.content()))
            .sum()
    }
}

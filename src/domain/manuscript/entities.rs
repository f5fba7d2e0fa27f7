//! Manuscript Context - Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ManuscriptError, PacingScore};

/// 结构规划中的一个情节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    pub id: String,
    pub description: String,
}

impl Beat {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    /// 大纲生成失败时的占位情节点
    pub fn placeholder() -> Self {
        Self::new("1", "Start of story")
    }
}

/// 章节状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Completed,
    Generating,
    Pending,
}

/// 章节
///
/// 不变量:
/// - history 只追加不删除
/// - content 总是等于 history[current_version]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    id: u32,
    title: String,
    content: String,
    status: ChapterStatus,
    history: Vec<String>,
    current_version: usize,
    last_modified: DateTime<Utc>,
    pacing_score: PacingScore,
}

impl Chapter {
    /// 以一个或多个版本创建已完成章节，最后一个版本为当前版本
    pub fn new(
        id: u32,
        title: impl Into<String>,
        versions: Vec<String>,
        pacing_score: PacingScore,
    ) -> Result<Self, ManuscriptError> {
        let content = versions.last().cloned().ok_or(ManuscriptError::EmptyHistory)?;
        Ok(Self {
            id,
            title: title.into(),
            content,
            status: ChapterStatus::Completed,
            current_version: versions.len() - 1,
            history: versions,
            last_modified: Utc::now(),
            pacing_score,
        })
    }

    /// 追加新版本并设为当前版本
    pub fn push_version(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.history.push(text.clone());
        self.current_version = self.history.len() - 1;
        self.content = text;
        self.last_modified = Utc::now();
    }

    /// 切换到历史版本
    pub fn select_version(&mut self, index: usize) -> Result<(), ManuscriptError> {
        let text = self
            .history
            .get(index)
            .cloned()
            .ok_or(ManuscriptError::VersionOutOfRange {
                chapter_id: self.id,
                index,
                len: self.history.len(),
            })?;
        self.current_version = index;
        self.content = text;
        self.last_modified = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> ChapterStatus {
        self.status
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn current_version(&self) -> usize {
        self.current_version
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn pacing_score(&self) -> PacingScore {
        self.pacing_score
    }
}

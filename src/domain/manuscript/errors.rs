//! Manuscript Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManuscriptError {
    #[error("章节不存在: {0}")]
    ChapterNotFound(u32),

    #[error("章节 {chapter_id} 的版本 {index} 超出范围（共 {len} 个版本）")]
    VersionOutOfRange {
        chapter_id: u32,
        index: usize,
        len: usize,
    },

    #[error("章节至少需要一个版本")]
    EmptyHistory,

    #[error("章节 {0} 中找不到选中的文本")]
    SelectionNotFound(u32),

    #[error("章节索引越界: {0}")]
    IndexOutOfRange(usize),
}

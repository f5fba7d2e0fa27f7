//! Editing Commands - 稿件编辑命令

use crate::domain::manuscript::MoveDirection;

/// 移动章节
#[derive(Debug, Clone, Copy)]
pub struct ReorderChapter {
    pub index: usize,
    pub direction: MoveDirection,
}

/// 切换章节版本
#[derive(Debug, Clone, Copy)]
pub struct SelectVersion {
    pub chapter_id: u32,
    pub version: usize,
}

/// 手动编辑章节（追加新版本）
#[derive(Debug, Clone)]
pub struct EditChapter {
    pub chapter_id: u32,
    pub content: String,
}

/// 全文查找替换
#[derive(Debug, Clone)]
pub struct FindReplace {
    pub find: String,
    pub replace: String,
}

/// 改写选中片段
#[derive(Debug, Clone)]
pub struct RewritePassage {
    pub chapter_id: u32,
    pub selection: String,
    pub instruction: String,
}

/// 删除选中片段并衔接上下文
#[derive(Debug, Clone)]
pub struct ErasePassage {
    pub chapter_id: u32,
    pub selection: String,
}

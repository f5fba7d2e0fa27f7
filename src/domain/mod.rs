//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Manuscript Context: 章节、元数据、选项
//! - Knowledge Context: 设定与角色状态
//!
//! 以及纯函数组件：上下文窗口、响应解析、原稿分块。

pub mod knowledge;
pub mod manuscript;

pub mod context_window;
pub mod response_parser;

mod analytics;
mod project;
mod text_segmenter;

pub use analytics::SessionAnalytics;
pub use project::ProjectState;
pub use text_segmenter::{count_words, split_into_source_chunks, ChunkConfig};

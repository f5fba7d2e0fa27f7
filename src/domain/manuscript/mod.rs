//! Manuscript Context - 稿件限界上下文
//!
//! 职责:
//! - 章节聚合与版本历史
//! - 项目元数据与生成参数
//! - 选项与节奏评分

mod aggregate;
mod entities;
mod errors;
mod metadata;
mod value_objects;

pub use aggregate::Manuscript;
pub use entities::{Beat, Chapter, ChapterStatus};
pub use errors::ManuscriptError;
pub use metadata::*;
pub use value_objects::{Choice, ChoiceType, MoveDirection, PacingScore, Placement};

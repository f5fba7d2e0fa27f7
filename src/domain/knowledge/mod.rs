//! Knowledge Context - 设定与角色状态
//!
//! 职责:
//! - 设定条目与角色状态实体
//! - 抽取结果的宽松解码
//! - 合并规则与关键词检索

mod entities;
mod extraction;
mod store;

pub use entities::{CharacterStatus, LoreCategory, LoreEntry};
pub use extraction::{CharacterUpdate, LoreCandidate, LoreExtraction};
pub use store::{
    apply_character_extraction, apply_lore_extraction, retrieve_context, KnowledgeDelta,
    KnowledgeStore,
};

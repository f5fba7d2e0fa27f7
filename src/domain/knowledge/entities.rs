//! Knowledge Context - Entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 设定条目分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoreCategory {
    Character,
    Location,
    Item,
    History,
    #[default]
    General,
}

impl LoreCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoreCategory::Character => "Character",
            LoreCategory::Location => "Location",
            LoreCategory::Item => "Item",
            LoreCategory::History => "History",
            LoreCategory::General => "General",
        }
    }

    /// 宽松解析，缺失或未知的分类归为 General
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "character" => LoreCategory::Character,
            "location" => LoreCategory::Location,
            "item" => LoreCategory::Item,
            "history" => LoreCategory::History,
            _ => LoreCategory::General,
        }
    }
}

impl std::fmt::Display for LoreCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设定条目
///
/// key 按大小写不敏感比较，同一 key 只保留第一次出现的条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreEntry {
    pub id: String,
    pub key: String,
    pub category: LoreCategory,
    pub description: String,
    pub tags: Vec<String>,
}

impl LoreEntry {
    pub fn new(
        key: impl Into<String>,
        category: LoreCategory,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            category,
            description: description.into(),
            tags,
        }
    }

    pub fn normalized_key(&self) -> String {
        normalize(&self.key)
    }
}

/// 角色状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStatus {
    pub id: String,
    pub name: String,
    pub status: String,
    pub location: String,
    pub goal: String,
    /// 物品集合，只做并集
    pub inventory: Vec<String>,
}

impl CharacterStatus {
    pub const DEFAULT_STATUS: &'static str = "Alive";
    pub const UNKNOWN: &'static str = "Unknown";

    /// 以默认值创建新角色
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: Self::DEFAULT_STATUS.to_string(),
            location: Self::UNKNOWN.to_string(),
            goal: Self::UNKNOWN.to_string(),
            inventory: Vec::new(),
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize(&self.name)
    }

    /// 合并物品（保持原有顺序，去重）
    pub fn merge_inventory<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            let item = item.into();
            if !item.trim().is_empty() && !self.inventory.contains(&item) {
                self.inventory.push(item);
            }
        }
    }
}

pub(crate) fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

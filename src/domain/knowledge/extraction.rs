//! Knowledge Context - 抽取结果
//!
//! 后端返回的抽取 JSON 形状不可靠，所有字段可缺省。

use serde::{Deserialize, Deserializer, Serialize};

/// 一次设定抽取的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreExtraction {
    pub lore: Vec<LoreCandidate>,
    pub characters: Vec<CharacterUpdate>,
}

impl LoreExtraction {
    pub fn is_empty(&self) -> bool {
        self.lore.is_empty() && self.characters.is_empty()
    }
}

/// 候选设定条目，缺少 key 的条目在合并时被跳过
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreCandidate {
    pub key: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl LoreCandidate {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// 去除空白后的 key，为空时返回 None
    pub fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    pub fn description(&self) -> &str {
        non_empty(&self.description).unwrap_or_default()
    }
}

/// 角色的局部更新，空值不会覆盖已知状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterUpdate {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(alias = "statusUpdate")]
    pub status: Option<String>,
    pub location: Option<String>,
    pub goal: Option<String>,
    pub inventory: Option<Vec<String>>,
}

impl CharacterUpdate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// null 按缺省值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 非空值
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

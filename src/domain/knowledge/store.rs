//! Knowledge Context - 设定库
//!
//! 合并规则:
//! - 设定条目：大小写不敏感的 key 先写者胜，重复候选直接丢弃
//! - 角色：只用非空字段覆盖，物品取并集，从不整体替换
//!
//! 合并函数都是纯函数，总是作用于调用时的最新状态。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::entities::normalize;
use super::extraction::non_empty;
use super::{CharacterStatus, CharacterUpdate, LoreCandidate, LoreCategory, LoreEntry, LoreExtraction};

const LORE_HEADER: &str = "\n*** LORE DATABASE (RELEVANT ENTRIES) ***\n";
const CHARACTER_HEADER: &str = "\n*** CHARACTER STATUS ***\n";

/// 检索与查询文本相关的设定，返回可拼入提示词的片段
///
/// 只有 key / tag / 角色名字面出现在查询文本中的条目才会入选，
/// 没有任何匹配时返回空字符串。
pub fn retrieve_context(query: &str, lore: &[LoreEntry], characters: &[CharacterStatus]) -> String {
    let query = query.to_lowercase();
    let mentions = |needle: &str| {
        let needle = normalize(needle);
        !needle.is_empty() && query.contains(&needle)
    };

    let relevant_lore: Vec<&LoreEntry> = lore
        .iter()
        .filter(|entry| mentions(entry.key.as_str()) || entry.tags.iter().any(|tag| mentions(tag.as_str())))
        .collect();
    let relevant_characters: Vec<&CharacterStatus> =
        characters.iter().filter(|c| mentions(c.name.as_str())).collect();

    let mut context = String::new();
    if !relevant_lore.is_empty() {
        context.push_str(LORE_HEADER);
        for entry in relevant_lore {
            context.push_str(&format!(
                "- {} ({}): {}\n",
                entry.key, entry.category, entry.description
            ));
        }
    }
    if !relevant_characters.is_empty() {
        context.push_str(CHARACTER_HEADER);
        for c in relevant_characters {
            context.push_str(&format!(
                "- {}: Currently at {}. Goal: {}. Status: {}.\n",
                c.name, c.location, c.goal, c.status
            ));
        }
    }
    context
}

/// 合并设定候选，返回新的设定列表
pub fn apply_lore_extraction(candidates: &[LoreCandidate], current: &[LoreEntry]) -> Vec<LoreEntry> {
    let mut lore = current.to_vec();
    let mut seen: HashSet<String> = current.iter().map(LoreEntry::normalized_key).collect();

    for candidate in candidates {
        let Some(key) = candidate.key() else {
            continue;
        };
        if !seen.insert(normalize(key)) {
            continue;
        }
        let category = candidate
            .category
            .as_deref()
            .map(LoreCategory::from_label)
            .unwrap_or_default();
        lore.push(LoreEntry::new(
            key,
            category,
            candidate.description(),
            candidate.tags.clone(),
        ));
    }
    lore
}

/// 合并角色更新，返回新的角色列表
pub fn apply_character_extraction(
    updates: &[CharacterUpdate],
    current: &[CharacterStatus],
) -> Vec<CharacterStatus> {
    let mut characters = current.to_vec();

    for update in updates {
        let name = update.name.trim();
        if name.is_empty() {
            continue;
        }
        let key = normalize(name);
        let index = match characters.iter().position(|c| c.normalized_name() == key) {
            Some(index) => index,
            None => {
                characters.push(CharacterStatus::new(name));
                characters.len() - 1
            }
        };
        merge_character(&mut characters[index], update);
    }
    characters
}

fn merge_character(character: &mut CharacterStatus, update: &CharacterUpdate) {
    if let Some(status) = non_empty(&update.status) {
        character.status = status.to_string();
    }
    if let Some(location) = non_empty(&update.location) {
        character.location = location.to_string();
    }
    if let Some(goal) = non_empty(&update.goal) {
        character.goal = goal.to_string();
    }
    if let Some(items) = &update.inventory {
        character.merge_inventory(items.iter().cloned());
    }
}

/// 本次合并带来的变化
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDelta {
    pub lore_added: usize,
    pub characters_touched: usize,
}

impl KnowledgeDelta {
    pub fn is_empty(&self) -> bool {
        self.lore_added == 0 && self.characters_touched == 0
    }
}

/// 设定库（设定条目 + 角色状态）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStore {
    lore: Vec<LoreEntry>,
    characters: Vec<CharacterStatus>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(lore: Vec<LoreEntry>, characters: Vec<CharacterStatus>) -> Self {
        Self { lore, characters }
    }

    /// 按当前状态合并一次抽取结果
    pub fn apply(&mut self, extraction: &LoreExtraction) -> KnowledgeDelta {
        let lore_before = self.lore.len();
        self.lore = apply_lore_extraction(&extraction.lore, &self.lore);

        let touched = extraction
            .characters
            .iter()
            .filter(|u| !u.name.trim().is_empty())
            .count();
        self.characters = apply_character_extraction(&extraction.characters, &self.characters);

        KnowledgeDelta {
            lore_added: self.lore.len() - lore_before,
            characters_touched: touched,
        }
    }

    /// 手动添加设定条目，key 已存在时返回 false
    pub fn add_lore(&mut self, candidate: LoreCandidate) -> bool {
        let before = self.lore.len();
        self.lore = apply_lore_extraction(std::slice::from_ref(&candidate), &self.lore);
        self.lore.len() > before
    }

    /// 手动更新角色（局部更新规则）
    pub fn upsert_character(&mut self, update: CharacterUpdate) {
        self.characters = apply_character_extraction(std::slice::from_ref(&update), &self.characters);
    }

    pub fn retrieve_context(&self, query: &str) -> String {
        retrieve_context(query, &self.lore, &self.characters)
    }

    pub fn lore(&self) -> &[LoreEntry] {
        &self.lore
    }

    pub fn characters(&self) -> &[CharacterStatus] {
        &self.characters
    }

    pub fn is_empty(&self) -> bool {
        self.lore.is_empty() && self.characters.is_empty()
    }
}

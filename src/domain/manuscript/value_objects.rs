//! Manuscript Context - Value Objects

use serde::{Deserialize, Serialize};

/// 节奏评分（1-10 叙事强度）
///
/// 后端未给出或给出非法值时使用中间值 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingScore(u8);

impl PacingScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const DEFAULT: u8 = 5;

    /// 截断到 1..=10
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// 从 JSON 数值解析，0 / NaN 视为缺失
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::default();
        }
        Self::new(value.round().min(f64::from(Self::MAX)) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for PacingScore {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// 选项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceType {
    Character,
    Subplot,
    Theme,
    Trope,
    Other,
    Pacing,
    Chaos,
}

impl ChoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceType::Character => "Character",
            ChoiceType::Subplot => "Subplot",
            ChoiceType::Theme => "Theme",
            ChoiceType::Trope => "Trope",
            ChoiceType::Other => "Other",
            ChoiceType::Pacing => "Pacing",
            ChoiceType::Chaos => "Chaos",
        }
    }

    /// 宽松解析，未知标签归为 Other
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "character" => ChoiceType::Character,
            "subplot" => ChoiceType::Subplot,
            "theme" => ChoiceType::Theme,
            "trope" => ChoiceType::Trope,
            "pacing" => ChoiceType::Pacing,
            "chaos" => ChoiceType::Chaos,
            _ => ChoiceType::Other,
        }
    }
}

/// 每轮生成后提供给用户的候选方向
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    pub rationale: String,
    #[serde(rename = "type")]
    pub kind: ChoiceType,
}

impl Choice {
    pub const BREATHING_ROOM_ID: &'static str = "BREATHING_ROOM";
    pub const BREATHING_ROOM_MARKER: &'static str = "Breathing Room";

    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        rationale: impl Into<String>,
        kind: ChoiceType,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            rationale: rationale.into(),
            kind,
        }
    }

    /// 结构化输出缺失或损坏时的兜底选项
    pub fn fallback_continue(reason: &str) -> Self {
        Self::new("A", "Continue", reason, ChoiceType::Other)
    }

    /// 节奏过快时插入的缓冲章节选项
    pub fn breathing_room() -> Self {
        Self::new(
            Self::BREATHING_ROOM_ID,
            "Insert a \"Breathing Room\" Chapter",
            "System detects high narrative intensity. Slow down to process character emotions.",
            ChoiceType::Pacing,
        )
    }

    /// 用户输入的选项文本是否指向缓冲章节
    pub fn is_breathing_room_text(text: &str) -> bool {
        text == Self::BREATHING_ROOM_ID || text.contains(Self::BREATHING_ROOM_MARKER)
    }
}

/// 新内容的放置方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// 开启新章节
    #[default]
    NewChapter,
    /// 续写当前章节
    Append,
}

impl Placement {
    pub fn instruction(&self) -> &'static str {
        match self {
            Placement::NewChapter => "START A NEW CHAPTER.",
            Placement::Append => "CONTINUE THE CURRENT CHAPTER.",
        }
    }
}

/// 章节移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

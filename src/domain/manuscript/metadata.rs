//! Manuscript Context - 项目元数据与生成参数
//!
//! GenerationConfig 在确认后不可变，唯一例外是编排器注入的临时覆盖
//! （例如缓冲章节强制慢节奏），覆盖只作用于一轮生成。

use serde::{Deserialize, Serialize};

use super::Beat;

/// 定义一个带显示标签的配置枚举
macro_rules! config_knob {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

// --- Structure & Pacing ---
config_knob!(ExpansionDepth { Micro => "Micro", Scene => "Scene", Chapter => "Chapter" } default Scene);
config_knob!(
    /// 节奏速度，Fast / Balanced 计入节奏升级计数
    PacingSpeed { SlowBurn => "Slow Burn", Balanced => "Balanced", Fast => "Fast" } default Balanced
);
config_knob!(NarrativeFlow { Linear => "Linear", NonLinear => "Non-Linear", Branching => "Branching" } default Linear);
config_knob!(TimeDilation {
    RealTime => "Real-time",
    Compressed => "Compressed",
    ExpandedMoment => "Expanded Moment",
    Montage => "Montage",
} default RealTime);
config_knob!(ChapterStructure {
    ClassicArc => "Classic Arc",
    SliceOfLife => "Slice of Life",
    Vignette => "Vignette",
    Cliffhanger => "Cliffhanger",
} default ClassicArc);

// --- Voice & Prose ---
config_knob!(Tone {
    DarkGritty => "Dark/Gritty",
    LightWhimsical => "Light/Whimsical",
    AcademicFormal => "Academic/Formal",
    Conversational => "Conversational",
} default DarkGritty);
config_knob!(ProseComplexity {
    Accessible => "Accessible",
    Standard => "Standard",
    Baroque => "Baroque",
    Experimental => "Experimental",
} default Standard);
config_knob!(SentenceRhythm {
    Staccato => "Staccato",
    Flowing => "Flowing",
    Variable => "Variable",
    Repetitive => "Repetitive",
} default Flowing);
config_knob!(VocabularyLevel {
    Simple => "Simple",
    College => "College",
    Archaic => "Archaic",
    Esoteric => "Esoteric",
} default College);
config_knob!(MetaphorFrequency {
    Sparse => "Sparse",
    Moderate => "Moderate",
    Dense => "Dense",
    Surreal => "Surreal",
} default Moderate);

// --- Narrative Mechanics ---
config_knob!(PointOfView {
    FirstPerson => "First Person",
    ThirdPersonLimited => "Third Person Limited",
    ThirdPersonOmniscient => "Third Person Omniscient",
    SecondPerson => "Second Person",
} default ThirdPersonLimited);
config_knob!(Tense { Past => "Past", Present => "Present", Future => "Future" } default Past);
config_knob!(NarrativeDistance {
    Intimate => "Intimate",
    Close => "Close",
    Distant => "Distant",
    Cinematic => "Cinematic",
} default Close);
config_knob!(NarrativeReliability {
    Reliable => "Reliable",
    Unreliable => "Unreliable",
    Naive => "Naive",
    Deceptive => "Deceptive",
} default Reliable);

// --- Immersion ---
config_knob!(SensoryDensity { High => "High", Medium => "Medium", Low => "Low" } default Medium);
config_knob!(AtmosphericFilter {
    Neutral => "Neutral",
    Hopeful => "Hopeful",
    Oppressive => "Oppressive",
    Eerie => "Eerie",
    Nostalgic => "Nostalgic",
} default Neutral);

// --- Character & Dialogue ---
config_knob!(DialogueRatio {
    DialogueHeavy => "Dialogue Heavy",
    Balanced => "Balanced",
    InternalMonologue => "Internal Monologue",
} default Balanced);
config_knob!(CharacterAgency { Passive => "Passive", Active => "Active" } default Active);
config_knob!(RelationshipDynamic {
    Cooperative => "Cooperative",
    ConflictDriven => "Conflict-Driven",
} default ConflictDriven);
config_knob!(SubtextLevel {
    OnTheNose => "On the Nose",
    Balanced => "Balanced",
    DeepSubtext => "Deep Subtext",
    Cryptic => "Cryptic",
} default Balanced);

// --- World & Plot ---
config_knob!(MagicRules { Hard => "Hard Rules", Soft => "Soft Rules" } default Soft);
config_knob!(WorldBuilding {
    Expository => "Expository",
    Integrated => "Integrated",
    Minimal => "Minimal",
} default Integrated);
config_knob!(ConflictFocus {
    Internal => "Internal",
    Interpersonal => "Interpersonal",
    Societal => "Societal",
    Elemental => "Elemental",
} default Interpersonal);

// --- Safety & Creativity ---
config_knob!(Creativity { Strict => "Strict", Interpretive => "Interpretive", Wild => "Wild" } default Interpretive);
config_knob!(ContentRating { G => "G", Pg13 => "PG-13", R => "R" } default Pg13);

/// 生成参数
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    pub expansion_depth: ExpansionDepth,
    pub pacing_speed: PacingSpeed,
    pub narrative_flow: NarrativeFlow,
    pub time_dilation: TimeDilation,
    pub chapter_structure: ChapterStructure,

    pub tone: Tone,
    pub prose_complexity: ProseComplexity,
    pub sentence_rhythm: SentenceRhythm,
    pub vocabulary_level: VocabularyLevel,
    pub metaphor_frequency: MetaphorFrequency,

    pub pov: PointOfView,
    pub tense: Tense,
    pub narrative_distance: NarrativeDistance,
    pub narrative_reliability: NarrativeReliability,

    pub sensory_density: SensoryDensity,
    pub atmospheric_filter: AtmosphericFilter,

    pub dialogue_ratio: DialogueRatio,
    pub character_agency: CharacterAgency,
    pub relationship_dynamic: RelationshipDynamic,
    pub subtext_level: SubtextLevel,

    pub magic_rules: MagicRules,
    pub world_building: WorldBuilding,
    pub conflict_focus: ConflictFocus,

    pub creativity: Creativity,
    pub rating: ContentRating,

    /// 每章提交后后台抽取设定
    pub auto_lore: bool,
    /// 续写章节自动批评并润色
    pub auto_critique: bool,
}

impl GenerationConfig {
    /// 是否计入节奏升级计数
    pub fn is_high_energy(&self) -> bool {
        matches!(self.pacing_speed, PacingSpeed::Fast | PacingSpeed::Balanced)
    }

    /// 缓冲章节使用的一次性覆盖：慢节奏、内省、高感官密度
    pub fn breathing_room_override(&self) -> Self {
        Self {
            pacing_speed: PacingSpeed::SlowBurn,
            expansion_depth: ExpansionDepth::Scene,
            dialogue_ratio: DialogueRatio::InternalMonologue,
            sensory_density: SensoryDensity::High,
            ..self.clone()
        }
    }
}

/// 项目元数据
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NovelMetadata {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub synopsis: String,
    pub themes: String,
    pub character_arcs: String,
    pub style_goals: String,
    pub comedy: String,
    pub min_word_count: u32,
    pub max_word_count: u32,
    /// 文风 DNA，会话内只计算一次
    pub style_dna: Option<String>,
    pub beat_sheet: Vec<Beat>,
    pub config: Option<GenerationConfig>,
}

impl NovelMetadata {
    pub fn style_dna(&self) -> &str {
        self.style_dna.as_deref().unwrap_or_default()
    }

    pub fn auto_lore(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.auto_lore)
    }

    pub fn auto_critique(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.auto_critique)
    }

    /// 已确认大纲中位于目标情节点之前的情节点
    pub fn beats_before(&self, beat_id: &str) -> &[Beat] {
        match self.beat_sheet.iter().position(|b| b.id == beat_id) {
            Some(index) => &self.beat_sheet[..index],
            None => &[],
        }
    }
}

/// 自动识别出的元数据（全部可缺省）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub synopsis: Option<String>,
    pub themes: Option<String>,
    pub character_arcs: Option<String>,
    pub style_goals: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_setup_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.pacing_speed, PacingSpeed::Balanced);
        assert_eq!(config.pov, PointOfView::ThirdPersonLimited);
        assert_eq!(config.rating.label(), "PG-13");
        assert!(config.is_high_energy());
    }

    #[test]
    fn test_breathing_room_override_keeps_other_knobs() {
        let config = GenerationConfig {
            tone: Tone::Conversational,
            pacing_speed: PacingSpeed::Fast,
            ..Default::default()
        };
        let slow = config.breathing_room_override();

        assert_eq!(slow.pacing_speed, PacingSpeed::SlowBurn);
        assert_eq!(slow.dialogue_ratio, DialogueRatio::InternalMonologue);
        assert_eq!(slow.sensory_density, SensoryDensity::High);
        assert_eq!(slow.tone, Tone::Conversational);
        assert!(!slow.is_high_energy());
    }

    #[test]
    fn test_config_deserializes_labels() {
        let json = r#"{"pacingSpeed":"Slow Burn","pov":"First Person","autoLore":true}"#;
        let config: GenerationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pacing_speed, PacingSpeed::SlowBurn);
        assert_eq!(config.pov, PointOfView::FirstPerson);
        assert!(config.auto_lore);
        assert!(!config.auto_critique);
    }

    #[test]
    fn test_beats_before() {
        let metadata = NovelMetadata {
            beat_sheet: vec![Beat::new("1", "a"), Beat::new("2", "b"), Beat::new("3", "c")],
            ..Default::default()
        };
        assert_eq!(metadata.beats_before("3").len(), 2);
        assert!(metadata.beats_before("1").is_empty());
        assert!(metadata.beats_before("missing").is_empty());
    }
}

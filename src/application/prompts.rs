//! 提示词构造
//!
//! 每个生成调用对应一个纯函数。截断长度按字符计。

use crate::domain::context_window::{head_chars, tail_chars, ContextWindow};
use crate::domain::knowledge::{CharacterStatus, LoreEntry};
use crate::domain::manuscript::{Beat, GenerationConfig, NovelMetadata, Placement};
use crate::domain::response_parser::STRATEGIC_SPLIT;

pub const METADATA_SAMPLE_CHARS: usize = 150_000;
pub const BEAT_SHEET_SAMPLE_CHARS: usize = 1_500_000;
pub const STYLE_SAMPLE_CHARS: usize = 50_000;
pub const LORE_SAMPLE_CHARS: usize = 50_000;
pub const CRITIQUE_SAMPLE_CHARS: usize = 5_000;
pub const CHAOS_CONTEXT_CHARS: usize = 5_000;
pub const REFINE_CONTEXT_CHARS: usize = 20_000;
pub const MEMORY_BANK_CONTEXT_CHARS: usize = 20_000;
pub const PASSAGE_CONTEXT_CHARS: usize = 1_000;

/// 配置缺失时的默认说明
pub const DEFAULT_CONFIG_SENTENCE: &str = "Use default balanced pacing and standard prose.";

/// 缓冲章节使用的选项文本
pub const INTERLUDE_CHOICE: &str = "Interlude";

/// 主生成调用的系统提示词
pub fn system_prompt() -> String {
    format!(
        r#"You are the Literary Expansion Architect, an analytical and creative partner for working novelists.
You receive one segment of an existing manuscript and return an expanded version that is longer, richer in detail
and indistinguishable from the original author's hand. You collaborate; you never replace the author's intent.

Work internally through analysis, expansion, a humanizing revision and a final polish, then propose exactly four
distinct, actionable directions for the next segment.

OUTPUT CONTRACT (the application parses it literally):
1. The expanded prose. Plain text or light markdown, never wrapped in a code block.
2. The separator line, exactly: {STRATEGIC_SPLIT}
3. One JSON object: {{"pacingScore": <1-10 narrative intensity of the prose>, "choices": [4 objects with keys "id" (A-D), "text", "rationale", "type" (Character | Subplot | Theme | Trope)]}}

Example:
The wind dragged itself across the valley... he closed the door.
{STRATEGIC_SPLIT}
{{"pacingScore": 6, "choices": [{{"id": "A", "text": "Force Mara to face the flooded mine.", "rationale": "Tests her new resolve.", "type": "Character"}}]}}"#
    )
}

/// 文风分析的系统提示词
pub const STYLE_ANALYSIS_PROMPT: &str = r#"You are a literary DNA analyst. Study the sample and produce a dense, technical profile of the author's voice:
1. Sentence structure and cadence (fragments, clause length, rhythm).
2. Vocabulary and diction (register, era, sensory or cerebral bias).
3. Tone and mood.
4. Narrative voice (person, distance, reliability).
5. Idiosyncrasies (recurring metaphors, motifs, dialogue habits).
Another model will use the profile to imitate this author precisely. Be specific."#;

/// 精修指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementDirective {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

pub const REFINEMENT_DIRECTIVES: [RefinementDirective; 6] = [
    RefinementDirective {
        id: "sensory",
        label: "Sensory Immersion",
        description: "Enhance sights, sounds, smells, and textures to make the scene visceral.",
    },
    RefinementDirective {
        id: "psychology",
        label: "Psychological Depth",
        description: "Deepen internal monologues, emotional reactions, and character subjectivity.",
    },
    RefinementDirective {
        id: "dialogue",
        label: "Dialogue Expansion",
        description: "Extend conversations, add subtext, and sharpen distinct character voices.",
    },
    RefinementDirective {
        id: "environment",
        label: "Environmental Texture",
        description: "Enrich world-building details and setting atmosphere.",
    },
    RefinementDirective {
        id: "pacing",
        label: "Pacing & Tension",
        description: "Adjust sentence rhythm to heighten suspense or improve narrative flow.",
    },
    RefinementDirective {
        id: "show_dont_tell",
        label: "Show, Don't Tell",
        description: "Convert summary exposition into active, unfolding scenes.",
    },
];

/// 选中指令的说明，按目录顺序以空格连接；未知 id 忽略
pub fn directive_instructions(selected: &[String]) -> String {
    REFINEMENT_DIRECTIVES
        .iter()
        .filter(|d| selected.iter().any(|id| id == d.id))
        .map(|d| d.description)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 渲染生成参数块
pub fn format_config(config: Option<&GenerationConfig>) -> String {
    let Some(c) = config else {
        return DEFAULT_CONFIG_SENTENCE.to_string();
    };
    format!(
        "*** NARRATIVE ENGINE PARAMETERS ***\n\
         [STRUCTURE]\n\
         Depth: {}, Speed: {}, Flow: {}\n\
         Time Handling: {}, Chapter Arc: {}\n\
         [VOICE & PROSE]\n\
         Tone: {}, POV: {}, Tense: {}\n\
         Complexity: {}, Rhythm: {}\n\
         Vocab: {}, Metaphor: {}\n\
         Distance: {}, Reliability: {}\n\
         [IMMERSION & ATMOSPHERE]\n\
         Sensory: {}, Atmosphere: {}\n\
         [CHARACTER & THEME]\n\
         Dialogue: {}, Agency: {}, Dynamic: {}\n\
         Subtext: {}, Conflict Focus: {}\n\
         [WORLD & CONSTRAINTS]\n\
         Magic: {}, Worldbuilding: {}\n\
         Creativity: {}, Rating: {}\n",
        c.expansion_depth,
        c.pacing_speed,
        c.narrative_flow,
        c.time_dilation,
        c.chapter_structure,
        c.tone,
        c.pov,
        c.tense,
        c.prose_complexity,
        c.sentence_rhythm,
        c.vocabulary_level,
        c.metaphor_frequency,
        c.narrative_distance,
        c.narrative_reliability,
        c.sensory_density,
        c.atmospheric_filter,
        c.dialogue_ratio,
        c.character_agency,
        c.relationship_dynamic,
        c.subtext_level,
        c.conflict_focus,
        c.magic_rules,
        c.world_building,
        c.creativity,
        c.rating,
    )
}

fn format_beats(beats: &[Beat]) -> String {
    beats
        .iter()
        .map(|b| format!("[{}] {}", b.id, b.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 第一章（setup）提示词
pub fn setup_prompt(
    metadata: &NovelMetadata,
    config: Option<&GenerationConfig>,
    chunk: &str,
) -> String {
    format!(
        "PHASE 1 SETUP.\n\
         Title: {}\nAuthor: {}\nGenre: {}\nSynopsis: {}\nThemes: {}\nCharacter Arcs: {}\n\
         Style Goals: {}\nComedy: {}\nTarget Length: {}-{} words\n\
         {}\n\
         Beats:\n{}\n\
         Style:\n{}\n\
         Source:\n\"{}\"\n\
         Output the expanded text, then {STRATEGIC_SPLIT}, then the JSON object.",
        metadata.title,
        metadata.author,
        metadata.genre,
        metadata.synopsis,
        metadata.themes,
        metadata.character_arcs,
        metadata.style_goals,
        metadata.comedy,
        metadata.min_word_count,
        metadata.max_word_count,
        format_config(config),
        format_beats(&metadata.beat_sheet),
        metadata.style_dna(),
        chunk,
    )
}

/// 续写提示词的输入
#[derive(Debug, Clone, Copy)]
pub struct ContinuationInput<'a> {
    pub config: Option<&'a GenerationConfig>,
    pub style_dna: &'a str,
    /// 累积正文（未压缩）
    pub history: &'a str,
    /// 设定库检索片段
    pub retrieved: &'a str,
    pub placement: Placement,
    pub choice: &'a str,
    pub instructions: &'a str,
    pub chunk: &'a str,
}

/// 续写提示词
pub fn continuation_prompt(input: &ContinuationInput<'_>, window: &ContextWindow) -> String {
    let enriched = format!("{}{}", input.history, input.retrieved);
    format!(
        "CONTINUATION. {} {}\n\
         Style: {}\n\
         Context: \"{}\"\n\
         User: {} {}\n\
         Source: \"{}\"\n\
         Output the expanded text, then {STRATEGIC_SPLIT}, then the JSON object.",
        input.placement.instruction(),
        format_config(input.config),
        input.style_dna,
        window.bound(&enriched),
        input.choice,
        input.instructions,
        input.chunk,
    )
}

/// 精修提示词
pub fn refinement_prompt(
    chapter_text: &str,
    instructions: &str,
    style_dna: &str,
    history: &str,
    window: &ContextWindow,
) -> String {
    let bounded = window.bound(history);
    format!(
        "You are performing a targeted refinement pass on an existing chapter.\n\n\
         Input:\n\
         1. The author's style DNA (must be preserved): {style_dna}\n\
         2. The current chapter text:\n\"{chapter_text}\"\n\n\
         Refinement directives. Rewrite the chapter focusing strictly on:\n{instructions}\n\n\
         Rules:\n\
         - Keep the original plot points, opening and ending. Change the execution, not the events.\n\
         - Keep roughly {} words.\n\
         - Apply the directives above.\n\n\
         Output only the rewritten chapter text, without JSON or commentary.\n\
         Context: {}",
        crate::domain::count_words(chapter_text),
        tail_chars(&bounded, REFINE_CONTEXT_CHARS),
    )
}

/// 按情节点生成章节的提示词
pub fn beat_prompt(style_dna: &str, previous: &[Beat], target: &Beat) -> String {
    let previous = previous
        .iter()
        .map(|b| format!("[Beat {}] {}", b.id, b.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "PARALLEL EXPANSION. Style: {style_dna}\n\
         Context Beats: {previous}\n\
         Target Beat: {}\n\
         Write chapter prose. No JSON.",
        target.description
    )
}

pub fn metadata_prompt(text: &str) -> String {
    format!(
        "Identify the manuscript metadata (title, author, genre, synopsis, themes, character arcs, style goals) from: \"{}...\"",
        head_chars(text, METADATA_SAMPLE_CHARS)
    )
}

pub fn beat_sheet_prompt(title: &str, text: &str) -> String {
    format!(
        "Produce a structural beat sheet as JSON {{\"beats\": [{{\"id\", \"description\"}}]}} for: Title: {title}\n\"{}\"",
        head_chars(text, BEAT_SHEET_SAMPLE_CHARS)
    )
}

pub fn style_prompt(sample: &str) -> String {
    format!("Analyze style: \"{}...\"", head_chars(sample, STYLE_SAMPLE_CHARS))
}

pub fn lore_prompt(text: &str) -> String {
    format!(
        "Read the story segment and extract NEW significant facts for a world bible.\n\
         Focus on:\n\
         1. Character status changes (location, health, items, goals).\n\
         2. New lore terms (locations, history, notable items).\n\n\
         Return JSON: {{\"lore\": [{{\"key\": \"...\", \"category\": \"Character|Location|Item|History\", \"description\": \"...\", \"tags\": [\"...\"]}}], \
         \"characters\": [{{\"name\": \"...\", \"status\": \"...\", \"location\": \"...\", \"goal\": \"...\", \"inventory\": [\"...\"]}}]}}\n\n\
         Text: \"{}\"",
        head_chars(text, LORE_SAMPLE_CHARS)
    )
}

pub fn critique_prompt(text: &str) -> String {
    format!(
        "Act as a ruthless literary editor. Identify 3-4 specific issues in the text below \
         (weak verbs, redundancy, pacing problems, logic gaps).\n\n\
         Text: \"{}\"\n\n\
         Return JSON: [{{\"id\": \"1\", \"quote\": \"text segment\", \"comment\": \"critique\", \"type\": \"Prose\"}}]",
        head_chars(text, CRITIQUE_SAMPLE_CHARS)
    )
}

/// 自动润色使用的修正说明
pub fn critique_fix_instructions(comments: &[String]) -> String {
    format!("Fix these specific issues: {}", comments.join(" "))
}

pub fn consistency_prompt(beat: &Beat, lore: &[LoreEntry], characters: &[CharacterStatus]) -> String {
    let lore_lines = lore
        .iter()
        .map(|l| format!("- {} ({}): {}", l.key, l.category, l.description))
        .collect::<Vec<_>>()
        .join("\n");
    let character_lines = characters
        .iter()
        .map(|c| {
            format!(
                "- {}: status {}, at {}, goal {}, carrying [{}]",
                c.name,
                c.status,
                c.location,
                c.goal,
                c.inventory.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "NARRATIVE UNIT TEST. Check the planned beat against the established facts and flag contradictions \
         (dead characters acting, impossible travel, items a character does not have, broken world rules).\n\n\
         Lore:\n{lore_lines}\n\nCharacters:\n{character_lines}\n\n\
         Planned Beat [{}]: {}\n\n\
         Return JSON: {{\"safe\": true|false, \"issues\": [\"...\"]}}",
        beat.id, beat.description
    )
}

pub fn chaos_prompt(context: &str, config: Option<&GenerationConfig>) -> String {
    let tone = config.map(|c| c.tone.label()).unwrap_or_default();
    format!(
        "From this story context, invent ONE shocking, high-entropy plot twist the reader will not expect.\n\
         Context Summary: \"{}\"\n\
         Tone: {tone}\n\n\
         Return JSON: {{\"id\": \"CHAOS\", \"text\": \"the twist\", \"rationale\": \"why it breaks expectations\", \"type\": \"Chaos\"}}",
        tail_chars(context, CHAOS_CONTEXT_CHARS)
    )
}

pub fn memory_bank_prompt(question: &str, lore_context: &str, history: &str) -> String {
    format!(
        "You are the memory bank for a novel in progress.\n\
         Context:\n{lore_context}\n...\n{}\n\n\
         User Question: \"{question}\"\n\n\
         Answer briefly and strictly from the text provided.",
        tail_chars(history, MEMORY_BANK_CONTEXT_CHARS)
    )
}

pub fn passage_rewrite_prompt(selection: &str, instruction: &str, context: &str) -> String {
    format!(
        "You are a surgical line editor.\n\n\
         Surrounding text:\n\"...{}...\"\n\n\
         Target text to edit:\n\"{selection}\"\n\n\
         Instruction: {instruction}\n\n\
         Output only the rewritten target text, without quotes or explanations.",
        tail_chars(context, PASSAGE_CONTEXT_CHARS)
    )
}

pub fn passage_erase_prompt(selection: &str, context: &str) -> String {
    format!(
        "SURGICAL REMOVAL.\n\
         Context: \"...{}...\"\n\
         Target to remove: \"{selection}\"\n\n\
         Write the short bridging text that replaces the target so the passage still flows, \
         keeping grammar and continuity intact. Output only the bridging text; it may be empty.",
        tail_chars(context, PASSAGE_CONTEXT_CHARS)
    )
}

/// 缓冲章节的附加说明
pub fn interlude_instructions(instructions: &str) -> String {
    format!("Write a slow-paced, atmospheric interlude. {instructions}")
}

//! 抽取调用
//!
//! 所有单次、结构化的辅助生成调用。除了精确编辑之外，每个调用失败时都
//! 使用固定的兜底值并记录 warn 日志，从不阻塞流程。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{GenerationError, GenerationRequest, TextGeneratorPort};
use crate::application::prompts;
use crate::domain::knowledge::{CharacterStatus, LoreEntry, LoreExtraction};
use crate::domain::manuscript::{Beat, Choice, ChoiceType, DetectedMetadata, GenerationConfig};

pub const STYLE_FALLBACK: &str = "Style analysis failed.";
pub const CHAOS_FALLBACK_TEXT: &str = "A sudden, inexplicable event changes everything.";
pub const MEMORY_BANK_FALLBACK: &str = "I couldn't find that in the archives.";

const STYLE_TEMPERATURE: f32 = 0.5;
const CHAOS_TEMPERATURE: f32 = 1.5;

/// 模型选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// 抽取 / 分析类调用
    pub analysis_model: String,
    /// 正文生成类调用
    pub drafting_model: String,
}

/// 编辑批评条目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CritiquePoint {
    pub id: String,
    pub quote: String,
    pub comment: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// 一致性检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyReport {
    pub safe: Option<bool>,
    pub issues: Vec<String>,
}

impl ConsistencyReport {
    pub fn safe() -> Self {
        Self {
            safe: Some(true),
            issues: Vec::new(),
        }
    }

    /// 是否需要用户确认
    pub fn is_flagged(&self) -> bool {
        match self.safe {
            Some(safe) => !safe,
            None => !self.issues.is_empty(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChaosPayload {
    id: String,
    text: String,
    rationale: String,
}

/// 抽取服务
pub struct ExtractionService {
    generator: Arc<dyn TextGeneratorPort>,
    models: ModelConfig,
}

impl ExtractionService {
    pub fn new(generator: Arc<dyn TextGeneratorPort>, models: ModelConfig) -> Self {
        Self { generator, models }
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    async fn ask_json<T: DeserializeOwned>(&self, prompt: String) -> Result<T, ExtractionFailure> {
        let request = GenerationRequest::new(&self.models.analysis_model, prompt).json();
        let raw = self.generator.generate_once(request).await?;
        decode_json(&raw)
    }

    /// 识别上传稿件的元数据，失败时返回空元数据
    pub async fn detect_metadata(&self, text: &str) -> DetectedMetadata {
        match self.ask_json(prompts::metadata_prompt(text)).await {
            Ok(detected) => detected,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata detection failed, using empty defaults");
                DetectedMetadata::default()
            }
        }
    }

    /// 生成大纲，失败或为空时返回单个占位情节点
    pub async fn beat_sheet(&self, title: &str, text: &str) -> Vec<Beat> {
        let beats = match self.ask_json::<Value>(prompts::beat_sheet_prompt(title, text)).await {
            Ok(value) => decode_beats(&value),
            Err(e) => {
                tracing::warn!(error = %e, "Beat sheet generation failed");
                Vec::new()
            }
        };
        if beats.is_empty() {
            tracing::warn!("Beat sheet empty, using placeholder beat");
            return vec![Beat::placeholder()];
        }
        beats
    }

    /// 文风分析（只在会话开始时运行一次）
    pub async fn analyze_style(&self, sample: &str) -> String {
        let request = GenerationRequest::new(&self.models.analysis_model, prompts::style_prompt(sample))
            .with_system_instruction(prompts::STYLE_ANALYSIS_PROMPT)
            .with_temperature(STYLE_TEMPERATURE);
        match self.generator.generate_once(request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => STYLE_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Style analysis failed");
                STYLE_FALLBACK.to_string()
            }
        }
    }

    /// 设定抽取，失败时返回 None（不做任何合并）
    pub async fn extract_lore(&self, text: &str) -> Option<LoreExtraction> {
        match self.ask_json::<LoreExtraction>(prompts::lore_prompt(text)).await {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                tracing::warn!(error = %e, "Lore extraction failed, nothing applied");
                None
            }
        }
    }

    /// 编辑批评，失败时返回空列表
    pub async fn critique(&self, text: &str) -> Vec<CritiquePoint> {
        match self.ask_json::<Value>(prompts::critique_prompt(text)).await {
            Ok(value) => decode_critique(value),
            Err(e) => {
                tracing::warn!(error = %e, "Critique failed, keeping draft");
                Vec::new()
            }
        }
    }

    /// 情节点一致性检查，失败时视为安全
    pub async fn check_consistency(
        &self,
        beat: &Beat,
        lore: &[LoreEntry],
        characters: &[CharacterStatus],
    ) -> ConsistencyReport {
        match self
            .ask_json::<ConsistencyReport>(prompts::consistency_prompt(beat, lore, characters))
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(beat_id = %beat.id, error = %e, "Consistency check skipped");
                ConsistencyReport::safe()
            }
        }
    }

    /// 生成一个混沌转折选项
    pub async fn chaos_twist(&self, context: &str, config: Option<&GenerationConfig>) -> Choice {
        let request =
            GenerationRequest::new(&self.models.analysis_model, prompts::chaos_prompt(context, config))
                .with_temperature(CHAOS_TEMPERATURE)
                .json();
        let payload = match self.generator.generate_once(request).await {
            Ok(raw) => decode_json::<ChaosPayload>(&raw).ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Chaos twist failed");
                None
            }
        };
        match payload {
            Some(p) if !p.text.trim().is_empty() => {
                let id = if p.id.is_empty() { "CHAOS".to_string() } else { p.id };
                Choice::new(id, p.text, p.rationale, ChoiceType::Chaos)
            }
            _ => Choice::new("CHAOS", CHAOS_FALLBACK_TEXT, "Engine fallback.", ChoiceType::Chaos),
        }
    }

    /// 故事问答
    pub async fn ask_story(&self, question: &str, lore_context: &str, history: &str) -> String {
        let request = GenerationRequest::new(
            &self.models.analysis_model,
            prompts::memory_bank_prompt(question, lore_context, history),
        );
        match self.generator.generate_once(request).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => MEMORY_BANK_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Memory bank query failed");
                MEMORY_BANK_FALLBACK.to_string()
            }
        }
    }

    /// 精确改写选中片段，空响应时保留原文
    pub async fn rewrite_passage(
        &self,
        selection: &str,
        instruction: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(
            &self.models.drafting_model,
            prompts::passage_rewrite_prompt(selection, instruction, context),
        );
        let text = self.generator.generate_once(request).await?;
        let text = text.trim();
        Ok(if text.is_empty() { selection.to_string() } else { text.to_string() })
    }

    /// 删除选中片段并生成衔接文本（可以为空）
    pub async fn erase_passage(&self, selection: &str, context: &str) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(
            &self.models.drafting_model,
            prompts::passage_erase_prompt(selection, context),
        );
        Ok(self.generator.generate_once(request).await?.trim().to_string())
    }
}

/// 抽取失败原因（只用于日志）
#[derive(Debug, thiserror::Error)]
enum ExtractionFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// 去掉代码块围栏后解码 JSON
fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionFailure> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    Ok(serde_json::from_str(cleaned.trim())?)
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// 接受 {"beats": [...]} 或直接的数组
fn decode_beats(value: &Value) -> Vec<Beat> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("beats")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let description = text_of(item.get("description"));
            if description.is_empty() {
                return None;
            }
            let id = match text_of(item.get("id")) {
                id if id.is_empty() => (index + 1).to_string(),
                id => id,
            };
            Some(Beat::new(id, description))
        })
        .collect()
}

/// 接受数组或 {"critique": [...]}，丢弃没有评论的条目
fn decode_critique(value: Value) -> Vec<CritiquePoint> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("critique").or_else(|| map.remove("issues")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<CritiquePoint>(item).ok())
        .filter(|point| !point.comment.trim().is_empty())
        .collect()
}

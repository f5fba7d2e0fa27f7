//! 响应解析
//!
//! 主生成调用返回 "正文 + 分隔符 + JSON"，后端只是按指令输出，并不保证格式。
//! 这里的所有函数都不会失败：无法解析时退化为一个兜底的 "Continue" 选项。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::manuscript::{Choice, ChoiceType, PacingScore};

/// 正文与结构化数据之间的分隔符
pub const STRATEGIC_SPLIT: &str = "|||STRATEGIC_SPLIT|||";

/// 结构化部分为空时的兜底原因
pub const FALLBACK_AUTO: &str = "Auto";
/// 结构化部分无法解析时的兜底原因
pub const FALLBACK_PARSE_ERROR: &str = "Parse Error";

/// 缺少分隔符时按顺序尝试的兜底匹配器
#[derive(Debug)]
pub struct FallbackMatcher {
    pub name: &'static str,
    regex: Regex,
}

impl FallbackMatcher {
    fn compile(name: &'static str, pattern: &str) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(regex) => Some(Self { name, regex }),
            Err(e) => {
                tracing::error!(matcher = name, error = %e, "Invalid fallback pattern");
                None
            }
        }
    }

    /// 第一个匹配的字节位置
    pub fn find(&self, raw: &str) -> Option<usize> {
        self.regex.find(raw).map(|m| m.start())
    }
}

/// 兜底匹配器列表，拆分时取最早出现的匹配（位置相同时取靠前的匹配器）
///
/// - choice_array: 以 `"id"` 开头的对象数组（旧格式）
/// - pacing_object: 以 `"pacingScore"` 开头的对象
pub fn fallback_matchers() -> &'static [FallbackMatcher] {
    static MATCHERS: OnceLock<Vec<FallbackMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        [
            ("choice_array", r#"\[\s*\{\s*"id"\s*:"#),
            ("pacing_object", r#"\{\s*"pacingScore""#),
        ]
        .into_iter()
        .filter_map(|(name, pattern)| FallbackMatcher::compile(name, pattern))
        .collect()
    })
}

/// 拆分后的原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResponse<'a> {
    pub prose: &'a str,
    pub structured: &'a str,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub prose: String,
    pub choices: Vec<Choice>,
    pub pacing_score: PacingScore,
    /// 是否使用了兜底选项
    pub degraded: bool,
}

/// 拆分正文与结构化部分
pub fn split_response(raw: &str) -> SplitResponse<'_> {
    if let Some(idx) = raw.find(STRATEGIC_SPLIT) {
        return SplitResponse {
            prose: &raw[..idx],
            structured: &raw[idx + STRATEGIC_SPLIT.len()..],
        };
    }

    let earliest = fallback_matchers()
        .iter()
        .filter_map(|matcher| matcher.find(raw).map(|idx| (idx, matcher.name)))
        .min_by_key(|(idx, _)| *idx);
    if let Some((idx, matcher)) = earliest {
        tracing::warn!(matcher, "Delimiter missing, split by fallback matcher");
        return SplitResponse {
            prose: &raw[..idx],
            structured: &raw[idx..],
        };
    }

    SplitResponse {
        prose: raw,
        structured: "",
    }
}

/// 解码结构化部分，返回 (选项, 节奏评分, 是否退化)
pub fn decode_structured(structured: &str) -> (Vec<Choice>, PacingScore, bool) {
    let cleaned = structured.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return (
            vec![Choice::fallback_continue(FALLBACK_AUTO)],
            PacingScore::default(),
            true,
        );
    }

    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(items)) => (decode_choices(&items), PacingScore::default(), false),
        Ok(Value::Object(map)) => {
            let choices = map
                .get("choices")
                .and_then(Value::as_array)
                .map(|items| decode_choices(items))
                .unwrap_or_default();
            let pacing = map
                .get("pacingScore")
                .and_then(decode_pacing)
                .unwrap_or_default();
            (choices, pacing, false)
        }
        Ok(other) => {
            tracing::warn!(kind = json_kind(&other), "Structured segment is not an object or array");
            (
                vec![Choice::fallback_continue(FALLBACK_PARSE_ERROR)],
                PacingScore::default(),
                true,
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode structured segment");
            (
                vec![Choice::fallback_continue(FALLBACK_PARSE_ERROR)],
                PacingScore::default(),
                true,
            )
        }
    }
}

/// 完整解析：拆分 + 解码，正文去除首尾空白
pub fn parse_response(raw: &str) -> ParsedResponse {
    let split = split_response(raw);
    let (choices, pacing_score, degraded) = decode_structured(split.structured);
    ParsedResponse {
        prose: split.prose.trim().to_string(),
        choices,
        pacing_score,
        degraded,
    }
}

/// 流式显示投影：截断到分隔符之前，隐藏末尾尚未完整的分隔符前缀
pub fn visible_projection(raw: &str) -> &str {
    if let Some(idx) = raw.find(STRATEGIC_SPLIT) {
        return &raw[..idx];
    }
    for len in (1..STRATEGIC_SPLIT.len()).rev() {
        if raw.ends_with(&STRATEGIC_SPLIT[..len]) {
            return &raw[..raw.len() - len];
        }
    }
    raw
}

/// 去除片段中的标签
pub fn strip_markup(fragment: &str) -> String {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    match TAG.get_or_init(|| Regex::new(r"<[^>]*>?").ok()) {
        Some(tag) => tag.replace_all(fragment, "").into_owned(),
        None => fragment.to_string(),
    }
}

fn decode_choices(items: &[Value]) -> Vec<Choice> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| decode_choice(index, item))
        .collect()
}

fn decode_choice(index: usize, item: &Value) -> Option<Choice> {
    let map = item.as_object()?;
    let field = |name: &str| map.get(name).map(value_to_text).unwrap_or_default();

    let text = field("text");
    if text.trim().is_empty() {
        return None;
    }
    let id = match field("id") {
        id if id.is_empty() => default_choice_id(index),
        id => id,
    };
    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .map(ChoiceType::from_label)
        .unwrap_or(ChoiceType::Other);

    Some(Choice::new(id, text, field("rationale"), kind))
}

fn decode_pacing(value: &Value) -> Option<PacingScore> {
    match value {
        Value::Number(n) => n.as_f64().map(PacingScore::from_f64),
        Value::String(s) => s.trim().parse::<f64>().ok().map(PacingScore::from_f64),
        _ => None,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn default_choice_id(index: usize) -> String {
    let letter = u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i));
    match letter {
        Some(c) => c.to_string(),
        None => (index + 1).to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"pacingScore":7,"choices":[{"id":"A","text":"Continue","rationale":"r","type":"Other"},{"id":"B","text":"Betray","rationale":"twist","type":"Subplot"}]}"#;

    #[test]
    fn test_delimiter_split() {
        let raw = format!("  Chapter one text.\n{STRATEGIC_SPLIT}{PAYLOAD}");
        let parsed = parse_response(&raw);

        assert_eq!(parsed.prose, "Chapter one text.");
        assert_eq!(parsed.pacing_score.value(), 7);
        assert_eq!(parsed.choices.len(), 2);
        assert_eq!(parsed.choices[1].kind, ChoiceType::Subplot);
        assert!(!parsed.degraded);
    }

    #[test]
    fn test_no_delimiter_no_json_is_all_prose() {
        let parsed = parse_response("Just a story with no data.");
        assert_eq!(parsed.prose, "Just a story with no data.");
        assert_eq!(parsed.choices, vec![Choice::fallback_continue(FALLBACK_AUTO)]);
        assert_eq!(parsed.pacing_score, PacingScore::default());
        assert!(parsed.degraded);
    }

    #[test]
    fn test_choice_array_matcher() {
        let matcher = &fallback_matchers()[0];
        assert_eq!(matcher.name, "choice_array");
        assert_eq!(matcher.find(r#"text [ { "id" : "A"}]"#), Some(5));
        assert_eq!(matcher.find("[1, 2]"), None);

        let parsed = parse_response(r#"Prose here. [{"id":"A","text":"Go north","rationale":"x","type":"Theme"}]"#);
        assert_eq!(parsed.prose, "Prose here.");
        assert_eq!(parsed.choices[0].text, "Go north");
        assert_eq!(parsed.pacing_score.value(), 5);
    }

    #[test]
    fn test_pacing_object_matcher() {
        let matcher = &fallback_matchers()[1];
        assert_eq!(matcher.name, "pacing_object");
        assert_eq!(matcher.find(r#"ab{ "pacingScore": 3}"#), Some(2));
        assert_eq!(matcher.find(r#"{"choices": []}"#), None);

        let parsed = parse_response(r#"Prose.{"pacingScore": 9, "choices": []}"#);
        assert_eq!(parsed.prose, "Prose.");
        assert_eq!(parsed.pacing_score.value(), 9);
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn test_earliest_fallback_match_wins() {
        let raw = r#"The gate opened. {"pacingScore":7,"choices":[{"id":"A","text":"Enter","rationale":"r","type":"Other"}]}"#;
        let split = split_response(raw);
        assert_eq!(split.prose, "The gate opened. ");
        assert!(split.structured.starts_with(r#"{"pacingScore":7"#));

        let parsed = parse_response(raw);
        assert_eq!(parsed.prose, "The gate opened.");
        assert_eq!(parsed.pacing_score.value(), 7);
        assert_eq!(parsed.choices[0].text, "Enter");
        assert!(!parsed.degraded);
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let raw = format!("Story{STRATEGIC_SPLIT}\n```json\n{PAYLOAD}\n```\n");
        let parsed = parse_response(&raw);
        assert_eq!(parsed.choices.len(), 2);
        assert!(!parsed.degraded);
    }

    #[test]
    fn test_malformed_json_degrades() {
        let raw = format!("Story{STRATEGIC_SPLIT}{{not json");
        let parsed = parse_response(&raw);
        assert_eq!(parsed.prose, "Story");
        assert_eq!(parsed.choices, vec![Choice::fallback_continue(FALLBACK_PARSE_ERROR)]);
        assert!(parsed.degraded);
    }

    #[test]
    fn test_scalar_payload_degrades() {
        let parsed = parse_response(&format!("Story{STRATEGIC_SPLIT}42"));
        assert!(parsed.degraded);
        assert_eq!(parsed.choices[0].rationale, FALLBACK_PARSE_ERROR);
    }

    #[test]
    fn test_lenient_choice_fields() {
        let raw = format!(
            r#"S{STRATEGIC_SPLIT}{{"pacingScore":"8","choices":[{{"text":"No id","type":"Romance"}},{{"id":"Z"}},"junk"]}}"#
        );
        let parsed = parse_response(&raw);
        assert_eq!(parsed.pacing_score.value(), 8);
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].id, "A");
        assert_eq!(parsed.choices[0].kind, ChoiceType::Other);
        assert_eq!(parsed.choices[0].rationale, "");
    }

    #[test]
    fn test_out_of_range_pacing_is_clamped() {
        let parsed = parse_response(&format!(r#"S{STRATEGIC_SPLIT}{{"pacingScore":15}}"#));
        assert_eq!(parsed.pacing_score.value(), 10);
        let parsed = parse_response(&format!(r#"S{STRATEGIC_SPLIT}{{"pacingScore":0}}"#));
        assert_eq!(parsed.pacing_score.value(), 5);
    }

    #[test]
    fn test_visible_projection() {
        assert_eq!(visible_projection("Hello"), "Hello");
        assert_eq!(visible_projection(&format!("Hello{STRATEGIC_SPLIT}{{")), "Hello");
        assert_eq!(visible_projection("Hello|||STRAT"), "Hello");
        assert_eq!(visible_projection("a|b"), "a|b");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Rain</p> fell"), "Rain fell");
        assert_eq!(strip_markup("plain"), "plain");
    }
}

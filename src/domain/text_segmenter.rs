//! 文本分块器
//!
//! 把上传的原稿切成按顺序消费的源文本块：先按空行分段，
//! 再把段落合并到接近目标词数为止。

use std::sync::OnceLock;

use regex::Regex;

/// 默认每块的大致词数
pub const DEFAULT_ROUGH_WORD_COUNT: usize = 1000;

/// 分块配置
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 每块的大致词数上限（单个超长段落不会被拆开）
    pub rough_word_count: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            rough_word_count: DEFAULT_ROUGH_WORD_COUNT,
        }
    }
}

/// 以空白分隔的词数
#[inline]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 按空行（允许夹带空白）拆分段落
fn split_paragraphs(text: &str) -> Vec<&str> {
    static BLANK_LINE: OnceLock<Option<Regex>> = OnceLock::new();
    match BLANK_LINE.get_or_init(|| Regex::new(r"\n\s*\n").ok()) {
        Some(re) => re.split(text).collect(),
        None => text.split("\n\n").collect(),
    }
}

/// 把原稿切成源文本块
///
/// 块之间保持原文顺序，每个段落后补一个空行。
pub fn split_into_source_chunks(text: &str, config: &ChunkConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;

    for paragraph in split_paragraphs(text) {
        if paragraph.trim().is_empty() {
            continue;
        }
        let words = count_words(paragraph);
        if !current.is_empty() && current_words + words > config.rough_word_count {
            chunks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current.push_str(paragraph);
        current.push_str("\n\n");
        current_words += words;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(words: usize) -> ChunkConfig {
        ChunkConfig {
            rough_word_count: words,
        }
    }

    #[test]
    fn test_groups_paragraphs_until_limit() {
        let text = "one two three\n\nfour five\n  \nsix seven eight nine";
        let chunks = split_into_source_chunks(text, &config(5));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "one two three\n\nfour five\n\n");
        assert_eq!(chunks[1], "six seven eight nine\n\n");
    }

    #[test]
    fn test_oversized_paragraph_stays_whole() {
        let text = "a b c d e f g h";
        let chunks = split_into_source_chunks(text, &config(3));
        assert_eq!(chunks, vec!["a b c d e f g h\n\n".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_into_source_chunks("", &ChunkConfig::default()).is_empty());
        assert!(split_into_source_chunks("\n\n \n\n", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("  the quick\n brown\tfox "), 4);
        assert_eq!(count_words(""), 0);
    }
}

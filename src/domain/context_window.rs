//! 上下文窗口
//!
//! 将无限增长的故事历史压缩到固定字符预算内：保留最近的内容，
//! 在被裁掉的位置插入标记。按字符（而非字节）计数。

/// 默认字符预算（约 200k token，按 4 字符/token 估算）
pub const MAX_CONTEXT_CHARS: usize = 800_000;

/// 在保留片段开头寻找段落分隔的范围
pub const BREAK_SEARCH_WINDOW: usize = 5_000;

/// 标记早期内容已被压缩
pub const CONDENSED_MARKER: &str =
    "[...Earliest context condensed for memory efficiency...]\n\n";

const PARAGRAPH_BREAK: &str = "\n\n";

/// 上下文窗口策略
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    budget: usize,
    break_window: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(MAX_CONTEXT_CHARS)
    }
}

impl ContextWindow {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            break_window: BREAK_SEARCH_WINDOW,
        }
    }

    pub fn with_break_window(mut self, break_window: usize) -> Self {
        self.break_window = break_window;
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// 压缩历史
    ///
    /// 结果（含标记）不超过预算，因此对结果再次压缩不会有任何变化。
    pub fn bound(&self, history: &str) -> String {
        if history.chars().count() <= self.budget {
            return history.to_string();
        }

        let marker_len = CONDENSED_MARKER.chars().count();
        let keep = self.budget.saturating_sub(marker_len);
        let kept = tail_chars(history, keep);

        let window = head_chars(kept, self.break_window);
        let resumed = match window.find(PARAGRAPH_BREAK) {
            Some(pos) => &kept[pos + PARAGRAPH_BREAK.len()..],
            None => kept,
        };

        let mut bounded = String::with_capacity(CONDENSED_MARKER.len() + resumed.len());
        bounded.push_str(CONDENSED_MARKER);
        bounded.push_str(resumed);
        bounded
    }
}

/// 使用默认预算压缩历史
pub fn bound(history: &str) -> String {
    ContextWindow::default().bound(history)
}

/// 前 n 个字符
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 后 n 个字符
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_len() -> usize {
        CONDENSED_MARKER.chars().count()
    }

    #[test]
    fn test_short_history_unchanged() {
        let window = ContextWindow::new(1_000);
        assert_eq!(window.bound("short story"), "short story");
        assert_eq!(window.bound(""), "");
    }

    #[test]
    fn test_cuts_at_paragraph_break() {
        let window = ContextWindow::new(marker_len() + 20).with_break_window(10);
        let history = format!("{}abc\n\nrecent text", "x".repeat(100));

        let bounded = window.bound(&history);
        assert_eq!(bounded, format!("{CONDENSED_MARKER}recent text"));
    }

    #[test]
    fn test_cuts_at_budget_without_break() {
        let window = ContextWindow::new(marker_len() + 10).with_break_window(5);
        let history = "y".repeat(50) + "0123456789";

        let bounded = window.bound(&history);
        assert_eq!(bounded, format!("{CONDENSED_MARKER}0123456789"));
        assert_eq!(bounded.chars().count(), window.budget());
    }

    #[test]
    fn test_bound_is_idempotent() {
        let window = ContextWindow::new(marker_len() + 300);
        let history: String = (0..200).map(|i| format!("para {i}\n\n")).collect();

        let once = window.bound(&history);
        let twice = window.bound(&once);
        assert_eq!(once, twice);
        assert!(once.chars().count() <= window.budget() + marker_len());
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let window = ContextWindow::new(marker_len() + 3);
        let bounded = window.bound("雪落无声夜色深");
        assert_eq!(bounded, format!("{CONDENSED_MARKER}夜色深"));
    }

    #[test]
    fn test_char_helpers() {
        assert_eq!(head_chars("héllo", 2), "hé");
        assert_eq!(head_chars("hi", 10), "hi");
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("hi", 10), "hi");
        assert_eq!(tail_chars("hi", 0), "");
    }
}

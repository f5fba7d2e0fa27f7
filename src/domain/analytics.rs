//! 会话统计
//!
//! 计数只增不减，只有整体重置会归零（未对外暴露）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub start_time: DateTime<Utc>,
    pub words_generated: u64,
    pub editing_time_seconds: u64,
    pub sessions_count: u32,
}

impl Default for SessionAnalytics {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            words_generated: 0,
            editing_time_seconds: 0,
            sessions_count: 1,
        }
    }
}

impl SessionAnalytics {
    pub fn record_words(&mut self, words: usize) {
        self.words_generated = self.words_generated.saturating_add(words as u64);
    }

    pub fn record_editing_seconds(&mut self, seconds: u64) {
        self.editing_time_seconds = self.editing_time_seconds.saturating_add(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_additive() {
        let mut analytics = SessionAnalytics::default();
        analytics.record_words(120);
        analytics.record_words(30);
        analytics.record_editing_seconds(1);
        analytics.record_editing_seconds(1);

        assert_eq!(analytics.words_generated, 150);
        assert_eq!(analytics.editing_time_seconds, 2);
        assert_eq!(analytics.sessions_count, 1);
    }
}

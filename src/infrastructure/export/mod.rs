//! Export - 项目导出
//!
//! JSON 完整快照与可被文字处理软件打开的 HTML 文档。
//! 两者都只接受 [`ProjectState`]，章节只导出当前版本。

mod html;

pub use html::{escape_html, export_document_html};

use chrono::{DateTime, Utc};

use crate::domain::ProjectState;

/// 带缩进的 JSON 快照
pub fn export_json(state: &ProjectState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(state)
}

/// JSON 导出的文件名：标题中的空白替换为下划线，附日期
pub fn json_file_name(state: &ProjectState, today: DateTime<Utc>) -> String {
    let title = state.metadata.title.split_whitespace().collect::<Vec<_>>().join("_");
    format!("Quill_Project_{title}_{}.json", today.format("%Y-%m-%d"))
}

/// 文档导出的文件名
pub fn document_file_name(state: &ProjectState) -> String {
    let title = state.metadata.title.trim();
    if title.is_empty() {
        "Novel.doc".to_string()
    } else {
        format!("{title}.doc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manuscript::{Chapter, NovelMetadata, PacingScore};
    use crate::domain::SessionAnalytics;
    use chrono::TimeZone;

    pub(super) fn state(title: &str) -> ProjectState {
        let mut chapter = Chapter::new(
            1,
            "Chapter 1",
            vec!["Draft.".to_string()],
            PacingScore::default(),
        )
        .unwrap();
        chapter.push_version("Rain & <wind>.\n\nThe second paragraph.");
        ProjectState {
            metadata: NovelMetadata {
                title: title.to_string(),
                author: "A. Writer".to_string(),
                ..Default::default()
            },
            chapters: vec![chapter],
            lore: Vec::new(),
            characters: Vec::new(),
            analytics: SessionAnalytics::default(),
            last_saved: Utc::now(),
        }
    }

    #[test]
    fn test_export_json_contains_active_content() {
        let json = export_json(&state("The Drowned City")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["title"], "The Drowned City");
        assert_eq!(
            value["chapters"][0]["content"],
            "Rain & <wind>.\n\nThe second paragraph."
        );
        assert!(value.get("lastSaved").is_some());
    }

    #[test]
    fn test_file_names() {
        let day = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(
            json_file_name(&state("The Drowned  City"), day),
            "Quill_Project_The_Drowned_City_2026-03-14.json"
        );
        assert_eq!(document_file_name(&state("  ")), "Novel.doc");
        assert_eq!(document_file_name(&state("Flood")), "Flood.doc");
    }
}

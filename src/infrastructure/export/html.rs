//! HTML 文档导出

use std::fmt::Write;

use crate::domain::ProjectState;

const DOCUMENT_STYLE: &str = "body { font-family: 'Times New Roman', serif; font-size: 12pt; line-height: 1.5; \
color: black; background: white; max-width: 800px; margin: 0 auto; padding: 20px; }\n\
h1 { font-size: 24pt; font-weight: bold; text-align: center; margin-bottom: 24pt; }\n\
h2 { font-size: 18pt; font-weight: bold; margin-top: 18pt; margin-bottom: 12pt; page-break-before: always; }\n\
p { margin-bottom: 12pt; text-indent: 0.5in; text-align: justify; }";

/// 转义 HTML 特殊字符
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 渲染整部稿件：标题、作者，每章一个标题，按空行分段
pub fn export_document_html(state: &ProjectState) -> String {
    let title = escape_html(&state.metadata.title);
    let mut html = String::new();

    // String 的 fmt::Write 不会失败
    let _ = write!(
        html,
        "<html xmlns:o='urn:schemas-microsoft-com:office:office' \
         xmlns:w='urn:schemas-microsoft-com:office:word' xmlns='http://www.w3.org/TR/REC-html40'>\n\
         <head><meta charset='utf-8'><title>{title}</title>\n<style>\n{DOCUMENT_STYLE}\n</style>\n</head><body>\n\
         <h1>{title}</h1>\n<p style=\"text-align:center\">by {}</p>\n",
        escape_html(&state.metadata.author)
    );

    for chapter in &state.chapters {
        let _ = writeln!(html, "<h2>{}</h2>", escape_html(chapter.title()));
        for paragraph in chapter.content().split("\n\n") {
            let paragraph = paragraph.trim();
            if !paragraph.is_empty() {
                let _ = writeln!(html, "<p>{}</p>", escape_html(paragraph));
            }
        }
    }

    html.push_str("</body></html>\n");
    html
}

//! 检索结果格式化为上下文文档块

use crate::search::{EncyclopediaDocument, WebSearchResponse};

const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// 网页检索结果格式化
///
/// 文本结果整体作为一个块；列表结果每条一个块并携带 href；空列表退化为空文本块。
pub fn format_web_results(response: &WebSearchResponse) -> String {
    match response {
        WebSearchResponse::Results(results) if !results.is_empty() => results
            .iter()
            .map(|doc| {
                let href = doc.url.as_deref().unwrap_or_default();
                let content = doc
                    .content
                    .as_deref()
                    .or(doc.title.as_deref())
                    .unwrap_or_default();
                format!("<Document href=\"{}\"/>\n{}\n</Document>", href, content)
            })
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR),
        WebSearchResponse::Results(_) => web_text_block(""),
        WebSearchResponse::Text(text) => web_text_block(text),
    }
}

fn web_text_block(text: &str) -> String {
    format!("<Document source=\"web_search\"/>\n{}\n</Document>", text)
}

/// 百科文档格式化，每篇文档一个块并携带 source 与 page
pub fn format_encyclopedia_docs(docs: &[EncyclopediaDocument]) -> String {
    docs.iter()
        .map(|doc| {
            format!(
                "<Document source=\"{}\" page=\"{}\"/>\n{}\n</Document>",
                doc.source,
                doc.page.as_deref().unwrap_or_default(),
                doc.page_content
            )
        })
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

//! 检索服务接入层：网页检索与百科检索

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod format;
pub mod tavily;
pub mod wikipedia;

pub use format::{format_encyclopedia_docs, format_web_results};
pub use tavily::TavilySearch;
pub use wikipedia::WikipediaLoader;

/// 网页检索的单条结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// 网页检索的返回值，服务端可能返回一段文本或结果列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSearchResponse {
    Text(String),
    Results(Vec<WebSearchResult>),
}

impl WebSearchResponse {
    pub fn result_count(&self) -> usize {
        match self {
            WebSearchResponse::Text(_) => 1,
            WebSearchResponse::Results(results) => results.len(),
        }
    }
}

/// 百科文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncyclopediaDocument {
    pub page_content: String,
    pub source: String,
    #[serde(default)]
    pub page: Option<String>,
}

/// 网页检索服务
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse>;
}

/// 百科检索服务
#[async_trait]
pub trait EncyclopediaSearch: Send + Sync {
    async fn load(&self, query: &str, max_docs: usize) -> Result<Vec<EncyclopediaDocument>>;
}

//! Wikipedia 百科检索，基于 MediaWiki API

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::ResearchError;
use crate::search::{EncyclopediaDocument, EncyclopediaSearch};

const PROVIDER: &str = "wikipedia";
const USER_AGENT: &str = concat!("research-panel-rs/", env!("CARGO_PKG_VERSION"));
/// 单篇文档正文的最大字符数
const DOC_CONTENT_CHARS_MAX: usize = 4000;

/// Wikipedia 文档加载器
#[derive(Clone)]
pub struct WikipediaLoader {
    http: reqwest::Client,
    language: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQueryBlock>,
}

#[derive(Debug, Deserialize)]
struct SearchQueryBlock {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQueryBlock>,
}

#[derive(Debug, Deserialize)]
struct ExtractQueryBlock {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: Option<String>,
}

impl WikipediaLoader {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            language: config.wikipedia_language.clone(),
        })
    }

    fn api_url(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.language)
    }

    fn page_url(&self, title: &str) -> String {
        format!(
            "https://{}.wikipedia.org/wiki/{}",
            self.language,
            title.replace(' ', "_")
        )
    }

    async fn get_json<T>(&self, params: &[(&str, String)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .get(self.api_url())
            .query(params)
            .send()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::provider(PROVIDER, format!("HTTP {}", status)).into());
        }

        Ok(response
            .json::<T>()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?)
    }

    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let params = [
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", query.to_string()),
            ("srlimit", limit.to_string()),
            ("format", "json".to_string()),
        ];
        let response: SearchResponse = self.get_json(&params).await?;
        Ok(response.query.map(|q| q.search).unwrap_or_default())
    }

    async fn fetch_extract(&self, pageid: u64) -> Result<String> {
        let params = [
            ("action", "query".to_string()),
            ("prop", "extracts".to_string()),
            ("explaintext", "1".to_string()),
            ("pageids", pageid.to_string()),
            ("format", "json".to_string()),
        ];
        let response: ExtractResponse = self.get_json(&params).await?;
        let extract = response
            .query
            .and_then(|mut q| q.pages.remove(&pageid.to_string()))
            .and_then(|p| p.extract)
            .unwrap_or_default();
        Ok(truncate_chars(&extract, DOC_CONTENT_CHARS_MAX))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[async_trait]
impl EncyclopediaSearch for WikipediaLoader {
    async fn load(&self, query: &str, max_docs: usize) -> Result<Vec<EncyclopediaDocument>> {
        if max_docs == 0 {
            return Ok(Vec::new());
        }

        let hits = self.search_titles(query, max_docs).await?;
        let mut docs = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().take(max_docs) {
            let page_content = self.fetch_extract(hit.pageid).await?;
            docs.push(EncyclopediaDocument {
                page_content,
                source: self.page_url(&hit.title),
                page: Some(hit.title),
            });
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> WikipediaLoader {
        WikipediaLoader::new(&SearchConfig::default()).unwrap()
    }

    #[test]
    fn test_urls() {
        let loader = loader();
        assert_eq!(loader.api_url(), "https://en.wikipedia.org/w/api.php");
        assert_eq!(
            loader.page_url("Cats and the Internet"),
            "https://en.wikipedia.org/wiki/Cats_and_the_Internet"
        );
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[
            {"ns":0,"title":"Cats and the Internet","pageid":123,"size":10},
            {"ns":0,"title":"Grumpy Cat","pageid":456,"size":20}
        ]}}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let hits = parsed.query.unwrap().search;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Grumpy Cat");
        assert_eq!(hits[1].pageid, 456);
    }

    #[test]
    fn test_parse_extract_response() {
        let json = r#"{"query":{"pages":{"123":{"pageid":123,"title":"Cats and the Internet","extract":"Images of cats are very popular."}}}}"#;
        let mut parsed: ExtractResponse = serde_json::from_str(json).unwrap();
        let page = parsed.query.as_mut().unwrap().pages.remove("123").unwrap();
        assert_eq!(page.extract.as_deref(), Some("Images of cats are very popular."));
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("猫猫猫", 2), "猫猫");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_zero_docs_short_circuits() {
        let docs = loader().load("cats", 0).await.unwrap();
        assert!(docs.is_empty());
    }
}

//! Tavily 网页检索

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::ResearchError;
use crate::search::{WebSearch, WebSearchResponse, WebSearchResult};

const PROVIDER: &str = "tavily";

/// Tavily 检索客户端
#[derive(Clone)]
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Option<Vec<WebSearchResult>>,
}

impl TavilySearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            api_key: config.tavily_api_key.clone(),
            base_url: config.tavily_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

impl TavilyResponse {
    /// 有结果列表时优先使用列表，否则退化为答案文本
    fn into_response(self) -> WebSearchResponse {
        match (self.results, self.answer) {
            (Some(results), _) if !results.is_empty() => WebSearchResponse::Results(results),
            (_, Some(answer)) => WebSearchResponse::Text(answer),
            (results, None) => WebSearchResponse::Results(results.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse> {
        let request = TavilyRequest {
            query,
            max_results,
            search_depth: "basic",
            include_answer: false,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::provider(PROVIDER, format!("HTTP {}: {}", status, body)).into());
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?;
        Ok(parsed.into_response())
    }
}

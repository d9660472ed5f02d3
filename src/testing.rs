//! 测试替身：按提示词脚本化应答的语言模型，以及可记录调用的检索服务
//!
//! 单元测试与 `tests/` 下的集成测试共用，不需要任何网络访问。

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::config::Config;
use crate::error::ResearchError;
use crate::generator::context::GeneratorContext;
use crate::llm::LanguageModel;
use crate::search::{
    EncyclopediaDocument, EncyclopediaSearch, WebSearch, WebSearchResponse, WebSearchResult,
};
use crate::types::{Analyst, Message, Perspectives, SearchQuery};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 模型调用的种类，根据系统提示词识别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Perspectives,
    SearchQuery,
    Question,
    Answer,
    Section,
    Report,
    Introduction,
    Conclusion,
    Other,
}

impl CallKind {
    fn classify(system_prompt: &str, messages: &[Message]) -> Self {
        let last = messages.last().map(|m| m.content()).unwrap_or_default();
        if system_prompt.starts_with("You are an analyst tasked with interviewing an expert") {
            CallKind::Question
        } else if system_prompt.starts_with("You are an expert being interviewed") {
            CallKind::Answer
        } else if system_prompt.starts_with("You are an expert technical writer") {
            CallKind::Section
        } else if system_prompt.starts_with("You are a technical writer creating a report") {
            CallKind::Report
        } else if system_prompt.starts_with("You are a technical writer finishing a report") {
            if last.contains("introduction") {
                CallKind::Introduction
            } else {
                CallKind::Conclusion
            }
        } else {
            CallKind::Other
        }
    }
}

/// 一次被记录的模型调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

/// 脚本化语言模型
///
/// 未指定分析师批次时，按系统提示词中的 "Pick the top N themes." 生成 N 个分析师。
#[derive(Default)]
pub struct ScriptedModel {
    analyst_batches: Mutex<VecDeque<Vec<Analyst>>>,
    question: Option<String>,
    report: Option<String>,
    fail_on: Option<CallKind>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回的分析师批次，用完后回到默认行为
    pub fn with_analyst_batches(mut self, batches: Vec<Vec<Analyst>>) -> Self {
        self.analyst_batches = Mutex::new(batches.into());
        self
    }

    /// 替换分析师提问的固定内容
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// 替换主体报告的固定内容
    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    /// 对指定种类的调用返回错误
    pub fn failing_on(mut self, kind: CallKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls_of(kind).len()
    }

    fn record(&self, kind: CallKind, system_prompt: &str, messages: &[Message]) -> Result<()> {
        lock(&self.calls).push(RecordedCall {
            kind,
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
        });
        if self.fail_on == Some(kind) {
            return Err(anyhow!("scripted failure for {:?}", kind));
        }
        Ok(())
    }

    fn default_analysts(system_prompt: &str) -> Vec<Analyst> {
        let count = system_prompt
            .split("Pick the top ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1);

        (1..=count)
            .map(|i| {
                Analyst::new(
                    format!("Analyst {}", i),
                    format!("Role {}", i),
                    format!("Affiliation {}", i),
                    format!("Focus area {}", i),
                )
            })
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, system_prompt: &str, messages: &[Message]) -> Result<String> {
        let kind = CallKind::classify(system_prompt, messages);
        self.record(kind, system_prompt, messages)?;

        let reply = match kind {
            CallKind::Question => self
                .question
                .clone()
                .unwrap_or_else(|| "What makes this topic so interesting?".to_string()),
            CallKind::Answer => "The sources agree on this point [1].\n\n[1] https://example.com/doc".to_string(),
            CallKind::Section => "## A Scripted Section\n### Summary\nAn insight [1].\n### Sources\n[1] https://example.com/doc".to_string(),
            CallKind::Report => self.report.clone().unwrap_or_else(|| {
                "## Insights\nCombined insights [1].\n## Sources\n[1] https://example.com/doc".to_string()
            }),
            CallKind::Introduction => "# Report Title\n## Introduction\nAn introduction.".to_string(),
            CallKind::Conclusion => "## Conclusion\nA conclusion.".to_string(),
            _ => "OK".to_string(),
        };
        Ok(reply)
    }

    async fn extract_perspectives(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<Perspectives> {
        self.record(CallKind::Perspectives, system_prompt, messages)?;
        let analysts = lock(&self.analyst_batches)
            .pop_front()
            .unwrap_or_else(|| Self::default_analysts(system_prompt));
        Ok(Perspectives { analysts })
    }

    async fn extract_search_query(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<SearchQuery> {
        self.record(CallKind::SearchQuery, system_prompt, messages)?;
        Ok(SearchQuery::new("scripted search query"))
    }
}

/// 记录查询的网页检索替身
#[derive(Default)]
pub struct MockWebSearch {
    fail: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 已收到的 (查询, 结果数上限)
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse> {
        lock(&self.queries).push((query.to_string(), max_results));
        if self.fail {
            return Err(ResearchError::provider("mock-web", "service unavailable").into());
        }
        Ok(WebSearchResponse::Results(
            (1..=max_results)
                .map(|i| WebSearchResult {
                    title: Some(format!("Result {}", i)),
                    url: Some(format!("https://example.com/{}", i)),
                    content: Some(format!("Web content {} for {}", i, query)),
                })
                .collect(),
        ))
    }
}

/// 记录查询的百科检索替身
#[derive(Default)]
pub struct MockEncyclopedia {
    fail: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockEncyclopedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl EncyclopediaSearch for MockEncyclopedia {
    async fn load(&self, query: &str, max_docs: usize) -> Result<Vec<EncyclopediaDocument>> {
        lock(&self.queries).push((query.to_string(), max_docs));
        if self.fail {
            return Err(ResearchError::provider("mock-wiki", "service unavailable").into());
        }
        Ok((1..=max_docs)
            .map(|i| EncyclopediaDocument {
                page_content: format!("Encyclopedia content {} for {}", i, query),
                source: format!("https://en.wikipedia.org/wiki/Page_{}", i),
                page: Some(format!("Page {}", i)),
            })
            .collect())
    }
}

/// 一组可在测试后检查的替身
pub struct TestServices {
    pub llm: Arc<ScriptedModel>,
    pub web: Arc<MockWebSearch>,
    pub encyclopedia: Arc<MockEncyclopedia>,
}

impl Default for TestServices {
    fn default() -> Self {
        Self::new(ScriptedModel::new())
    }
}

impl TestServices {
    pub fn new(llm: ScriptedModel) -> Self {
        Self {
            llm: Arc::new(llm),
            web: Arc::new(MockWebSearch::new()),
            encyclopedia: Arc::new(MockEncyclopedia::new()),
        }
    }

    pub fn context(&self, config: Config) -> GeneratorContext {
        GeneratorContext::with_services(
            config,
            self.llm.clone(),
            self.web.clone(),
            self.encyclopedia.clone(),
        )
    }
}

/// 不落盘的测试配置
pub fn test_config(topic: &str, max_analysts: usize) -> Config {
    Config {
        topic: topic.to_string(),
        max_analysts,
        persist_checkpoints: false,
        ..Config::default()
    }
}

/// 检查点落盘到指定目录的测试配置
pub fn persistent_config(topic: &str, max_analysts: usize, dir: &Path) -> Config {
    Config {
        topic: topic.to_string(),
        max_analysts,
        persist_checkpoints: true,
        internal_path: dir.join(".research"),
        output_path: dir.join("research_report.md"),
        ..Config::default()
    }
}

//! 语言模型接入层

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Message, Perspectives, SearchQuery};

pub mod client;

pub use client::LLMClient;

/// 调研流程依赖的语言模型能力
///
/// 结构化调用只需要支持两种形状，因此以具体方法暴露，保持 trait 可以作为 `dyn` 使用。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 返回自由文本
    async fn invoke(&self, system_prompt: &str, messages: &[Message]) -> Result<String>;

    /// 解码为分析师集合
    async fn extract_perspectives(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<Perspectives>;

    /// 解码为一条检索语句
    async fn extract_search_query(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<SearchQuery>;
}

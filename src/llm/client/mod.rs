//! LLM客户端 - 基于rig的统一模型服务接口

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use rig::extractor::ExtractionError;
use std::future::Future;

use crate::config::LLMConfig;
use crate::error::ResearchError;
use crate::llm::LanguageModel;
use crate::types::{Message, Perspectives, SearchQuery, get_buffer_string};

mod providers;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        println!("🔄 正在检查模型连接...");
        match self.prompt("You are a helpful assistant.", "Hello").await {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 通用重试逻辑，按固定间隔重试；解码失败不重试
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if is_decoding_error(&err) => return Err(err),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(attempt = retries, max_retries, error = %err, "model call failed");
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(retry_delay_ms)).await;
                }
            }
        }
    }

    /// 数据提取方法，模型输出必须解码为 `T`
    pub async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let extractor = self
            .client
            .create_extractor::<T>(&self.config.model, system_prompt, &self.config)?;

        self.retry_with_backoff(|| async {
            extractor
                .extract(user_prompt)
                .await
                .map_err(classify_extraction_error::<T>)
        })
        .await
    }

    /// 单轮对话方法
    pub async fn prompt(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let agent = self
            .client
            .create_agent(&self.config.model, system_prompt, &self.config)?;

        self.retry_with_backoff(|| async { agent.prompt(user_prompt).await })
            .await
    }
}

/// 消息历史作为用户提示词发给模型
fn render_conversation(messages: &[Message]) -> String {
    get_buffer_string(messages)
}

/// 无数据或反序列化失败归为解码错误，其余保持原样
fn classify_extraction_error<T>(err: ExtractionError) -> anyhow::Error {
    match err {
        ExtractionError::NoData | ExtractionError::DeserializationError(_) => {
            ResearchError::decoding(short_type_name::<T>(), err).into()
        }
        other => anyhow::Error::new(other),
    }
}

fn is_decoding_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ResearchError>(),
        Some(ResearchError::Decoding { .. })
    )
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[async_trait]
impl LanguageModel for LLMClient {
    async fn invoke(&self, system_prompt: &str, messages: &[Message]) -> Result<String> {
        self.prompt(system_prompt, &render_conversation(messages))
            .await
    }

    async fn extract_perspectives(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<Perspectives> {
        self.extract(system_prompt, &render_conversation(messages))
            .await
    }

    async fn extract_search_query(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<SearchQuery> {
        self.extract(system_prompt, &render_conversation(messages))
            .await
    }
}

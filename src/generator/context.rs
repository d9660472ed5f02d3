use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    config::Config,
    llm::{LLMClient, LanguageModel},
    memory::Memory,
    search::{EncyclopediaSearch, TavilySearch, WebSearch, WikipediaLoader},
};

#[derive(Clone)]
pub struct GeneratorContext {
    /// 语言模型
    pub llm: Arc<dyn LanguageModel>,
    /// 网页检索
    pub web_search: Arc<dyn WebSearch>,
    /// 百科检索
    pub encyclopedia: Arc<dyn EncyclopediaSearch>,
    /// 配置
    pub config: Config,
    /// 运行快照存储
    pub memory: Arc<RwLock<Memory>>,
}

impl GeneratorContext {
    /// 按配置创建真实的模型与检索客户端
    pub fn new(config: Config) -> Result<Self> {
        let llm = LLMClient::new(config.llm.clone())?;
        Self::with_llm_client(config, llm)
    }

    /// 使用已创建（通常已完成连接检查）的模型客户端
    pub fn with_llm_client(config: Config, llm: LLMClient) -> Result<Self> {
        let web_search = TavilySearch::new(&config.search)?;
        let encyclopedia = WikipediaLoader::new(&config.search)?;
        Ok(Self::with_services(
            config,
            Arc::new(llm),
            Arc::new(web_search),
            Arc::new(encyclopedia),
        ))
    }

    /// 显式注入各项服务
    pub fn with_services(
        config: Config,
        llm: Arc<dyn LanguageModel>,
        web_search: Arc<dyn WebSearch>,
        encyclopedia: Arc<dyn EncyclopediaSearch>,
    ) -> Self {
        let memory = if config.persist_checkpoints {
            Memory::with_persist_dir(config.checkpoint_dir())
        } else {
            Memory::new()
        };

        Self {
            llm,
            web_search,
            encyclopedia,
            config,
            memory: Arc::new(RwLock::new(memory)),
        }
    }

    /// 存储数据到 Memory
    pub async fn store_to_memory<T>(&self, scope: &str, key: &str, data: T) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        let mut memory = self.memory.write().await;
        memory.store(scope, key, data).await
    }

    /// 从 Memory 获取数据
    pub async fn get_from_memory<T>(&self, scope: &str, key: &str) -> Result<Option<T>>
    where
        T: for<'a> Deserialize<'a> + Send + Sync,
    {
        let mut memory = self.memory.write().await;
        memory.get(scope, key).await
    }

    /// 检查Memory中是否存在指定数据
    pub async fn has_memory_data(&self, scope: &str, key: &str) -> bool {
        let memory = self.memory.read().await;
        memory.has_data(scope, key)
    }

    /// 获取Memory使用统计
    pub async fn get_memory_stats(&self) -> HashMap<String, usize> {
        let memory = self.memory.read().await;
        memory.get_usage_stats()
    }
}

use crate::config::{Config, LLMProvider};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Research Panel - 由多位 AI 分析师访谈专家并撰写研究报告
#[derive(Parser, Debug)]
#[command(name = "research-panel-rs")]
#[command(
    about = "Multi-agent research report generator: AI analyst personas interview a search-grounded expert, then a writer assembles the final report."
)]
#[command(version)]
pub struct Args {
    /// 调研主题
    #[arg(short, long)]
    pub topic: Option<String>,

    /// 分析师数量上限
    #[arg(short = 'n', long)]
    pub max_analysts: Option<usize>,

    /// 运行线程标识，用于检查点存取与恢复
    #[arg(long)]
    pub thread_id: Option<String>,

    /// 报告输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 第一次暂停时注入的反馈
    #[arg(short, long)]
    pub feedback: Option<String>,

    /// 在人工反馈节点从标准输入读取反馈
    #[arg(short, long)]
    pub interactive: bool,

    /// 导出流程图（mermaid 文本）到内部目录
    #[arg(long)]
    pub export_graphs: bool,

    /// LLM Provider (openai, deepseek, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 并发访谈数上限
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// 每场访谈的专家回答轮数上限
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// 网页检索结果数上限
    #[arg(long)]
    pub web_max_results: Option<usize>,

    /// 百科检索文档数上限
    #[arg(long)]
    pub wikipedia_max_docs: Option<usize>,

    /// 不将检查点落盘
    #[arg(long)]
    pub no_persist: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置：配置文件 → 环境变量 → 命令行，后者覆盖前者
    pub fn into_config(self) -> Result<Config> {
        let mut config = if let Some(config_path) = &self.config {
            // 显式指定的配置文件必须可读
            Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?
        } else {
            let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            Config::load_default(&current_dir)?
        };

        config.apply_env();
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(self, config: &mut Config) {
        if let Some(topic) = self.topic {
            config.topic = topic;
        }
        if let Some(max_analysts) = self.max_analysts {
            config.max_analysts = max_analysts;
        }
        if let Some(thread_id) = self.thread_id {
            config.thread_id = Some(thread_id);
        }
        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(feedback) = self.feedback {
            config.initial_feedback = Some(feedback);
        }
        config.interactive |= self.interactive;
        config.export_graphs |= self.export_graphs;

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            if let Ok(provider) = provider_str.parse::<LLMProvider>() {
                config.llm.provider = provider;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                );
            }
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = Some(llm_api_base_url);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(max_parallels) = self.max_parallels {
            config.llm.max_parallels = max_parallels;
        }

        // 访谈与检索配置
        if let Some(max_turns) = self.max_turns {
            config.interview.max_num_turns = max_turns;
        }
        if let Some(web_max_results) = self.web_max_results {
            config.search.web_max_results = web_max_results;
        }
        if let Some(wikipedia_max_docs) = self.wikipedia_max_docs {
            config.search.wikipedia_max_docs = wikipedia_max_docs;
        }

        // 其他配置
        if self.no_persist {
            config.persist_checkpoints = false;
        }
        if self.verbose {
            config.log_level = String::from("debug");
        }
    }
}

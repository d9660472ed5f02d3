use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    #[default]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" | "google" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 调研主题
    pub topic: String,

    /// 分析师数量上限
    pub max_analysts: usize,

    /// 运行线程标识，检查点按此键存取；为空时启动时生成
    pub thread_id: Option<String>,

    /// 最终报告输出路径
    pub output_path: PathBuf,

    /// 内部工作目录路径 (.research)，存放检查点与流程图
    pub internal_path: PathBuf,

    /// 是否将检查点落盘
    pub persist_checkpoints: bool,

    /// 在人工反馈节点从标准输入读取反馈
    pub interactive: bool,

    /// 第一次暂停时注入的反馈
    pub initial_feedback: Option<String>,

    /// 是否导出流程图（mermaid 文本）
    pub export_graphs: bool,

    /// 日志级别（tracing EnvFilter 语法）
    pub log_level: String,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 检索配置
    pub search: SearchConfig,

    /// 访谈配置
    pub interview: InterviewConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址，为空时使用provider默认地址
    pub api_base_url: Option<String>,

    /// 模型名称
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 并发访谈数上限
    pub max_parallels: usize,
}

/// 检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API KEY
    pub tavily_api_key: String,

    /// Tavily API基地址
    pub tavily_base_url: String,

    /// 网页检索结果数上限
    pub web_max_results: usize,

    /// 百科检索文档数上限
    pub wikipedia_max_docs: usize,

    /// 百科语言（子域名）
    pub wikipedia_language: String,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 访谈配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct InterviewConfig {
    /// 专家回答轮数上限
    pub max_num_turns: usize,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 用环境变量覆盖配置，变量名沿用 .env 中的约定
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(provider) = non_empty("LLM_PROVIDER") {
            match provider.parse::<LLMProvider>() {
                Ok(provider) => self.llm.provider = provider,
                Err(e) => eprintln!("⚠️ 警告: {}，使用默认provider", e),
            }
        }
        if self.llm.api_key.is_empty() {
            let key_var = match self.llm.provider {
                LLMProvider::Gemini => "GOOGLE_API_KEY",
                LLMProvider::OpenAI => "OPENAI_API_KEY",
                LLMProvider::Anthropic => "ANTHROPIC_API_KEY",
                LLMProvider::DeepSeek => "DEEPSEEK_API_KEY",
                LLMProvider::Ollama => "OLLAMA_API_KEY",
            };
            if let Some(key) = non_empty("RESEARCH_LLM_API_KEY").or_else(|| non_empty(key_var)) {
                self.llm.api_key = key;
            }
        }
        if self.search.tavily_api_key.is_empty()
            && let Some(key) = non_empty("TAVILY_API_KEY")
        {
            self.search.tavily_api_key = key;
        }
        if let Some(n) = non_empty("WEB_SEARCH_MAX_RESULTS").and_then(|v| v.parse().ok()) {
            self.search.web_max_results = n;
        }
        if let Some(n) = non_empty("WIKIPEDIA_MAX_DOCS").and_then(|v| v.parse().ok()) {
            self.search.wikipedia_max_docs = n;
        }
        if let Some(n) = non_empty("MAX_INTERVIEW_TURNS").and_then(|v| v.parse().ok()) {
            self.interview.max_num_turns = n;
        }
        if let Some(level) = non_empty("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// 启动前校验，缺少必需的密钥时直接失败
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            bail!("topic must not be empty");
        }
        if self.max_analysts == 0 {
            bail!("max_analysts must be at least 1");
        }
        if self.interview.max_num_turns == 0 {
            bail!("interview.max_num_turns must be at least 1");
        }
        if self.llm.provider != LLMProvider::Ollama && self.llm.api_key.trim().is_empty() {
            bail!(
                "an API key for provider `{}` is required (set RESEARCH_LLM_API_KEY or the provider key)",
                self.llm.provider
            );
        }
        if self.search.tavily_api_key.trim().is_empty() {
            bail!("TAVILY_API_KEY environment variable is required");
        }
        Ok(())
    }

    /// 检查点目录
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.internal_path.join("checkpoints")
    }

    /// 流程图导出目录
    pub fn graph_dir(&self) -> PathBuf {
        self.internal_path.join("graphs")
    }

    /// 从默认位置加载配置文件，不存在时使用默认值
    pub fn load_default(dir: &Path) -> Result<Self> {
        let default_config_path = dir.join("research.toml");
        if default_config_path.exists() {
            Self::from_file(&default_config_path)
        } else {
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topic: String::from("Why people love so much cats in the Internet?"),
            max_analysts: 3,
            thread_id: None,
            output_path: PathBuf::from("research_report.md"),
            internal_path: PathBuf::from(".research"),
            persist_checkpoints: true,
            interactive: false,
            initial_feedback: None,
            export_graphs: false,
            log_level: String::from("info"),
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            interview: InterviewConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: String::new(),
            api_base_url: None,
            model: String::from("gemini-2.0-flash-lite"),
            max_tokens: 8192,
            temperature: 0.0,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            max_parallels: 3,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            tavily_base_url: String::from("https://api.tavily.com"),
            web_max_results: 3,
            wikipedia_max_docs: 2,
            wikipedia_language: String::from("en"),
            timeout_seconds: 60,
        }
    }
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self { max_num_turns: 2 }
    }
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 分析师画像
///
/// 字段的文档注释会进入 JSON Schema，作为结构化输出的字段描述发给模型，因此保持英文。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Analyst {
    /// Primary affiliation of the analyst.
    pub affiliation: String,
    /// Name of the analyst.
    pub name: String,
    /// Role of the analyst in the context of the topic.
    pub role: String,
    /// Description of the analyst focus, concerns, and motives.
    pub description: String,
}

impl Analyst {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        affiliation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            affiliation: affiliation.into(),
            name: name.into(),
            role: role.into(),
            description: description.into(),
        }
    }

    /// 分析师的人设文本，拼入提问与回答的系统提示词
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}\n",
            self.name, self.role, self.affiliation, self.description
        )
    }
}

/// 检索语句，仅用于强制模型以结构化方式给出一条检索词
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SearchQuery {
    /// Search query for retrieval.
    #[serde(default)]
    pub search_query: String,
}

impl SearchQuery {
    pub fn new(search_query: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
        }
    }
}

/// 分析师集合，分析师生成步骤的结构化输出
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct Perspectives {
    /// Comprehensive list of analysts with their roles and affiliations.
    pub analysts: Vec<Analyst>,
}

use serde::{Deserialize, Serialize};

/// 专家回答的固定发言人标识
pub const EXPERT_NAME: &str = "expert";

/// 消息角色
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    /// 对话记录中的行前缀
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Human => "Human",
            Role::Ai => "AI",
        }
    }
}

/// 访谈中的一条消息
///
/// 发言人身份在构造时确定，之后不再修改。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            name: None,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            name: None,
            content: content.into(),
        }
    }

    /// 由专家给出的回答
    pub fn expert(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            name: Some(EXPERT_NAME.to_string()),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_from(&self, name: &str) -> bool {
        self.role == Role::Ai && self.name.as_deref() == Some(name)
    }
}

/// 把消息历史拼成一份扁平的对话记录，每条消息一行，带角色前缀
pub fn get_buffer_string(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.prefix(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

//! 各流程图的状态记录
//!
//! `context` 与 `sections` 只能通过 `append_*` 追加，并发分支的结果按到达顺序合并。

use serde::{Deserialize, Serialize};

use crate::types::{Analyst, Message};

/// 反馈非空即视为要求重新生成，内容不做解释
fn feedback_present(feedback: &Option<String>) -> bool {
    feedback.as_deref().is_some_and(|f| !f.is_empty())
}

/// 分析师生成流程的状态
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationState {
    pub topic: String,
    pub max_analysts: usize,
    pub human_analyst_feedback: Option<String>,
    pub analysts: Vec<Analyst>,
}

impl GenerationState {
    pub fn new(topic: impl Into<String>, max_analysts: usize) -> Self {
        Self {
            topic: topic.into(),
            max_analysts,
            ..Default::default()
        }
    }

    pub fn has_feedback(&self) -> bool {
        feedback_present(&self.human_analyst_feedback)
    }
}

/// 单次访谈的状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewState {
    pub messages: Vec<Message>,
    pub max_num_turns: usize,
    context: Vec<String>,
    pub analyst: Analyst,
    pub interview: Option<String>,
    sections: Vec<String>,
}

impl InterviewState {
    pub fn new(analyst: Analyst, messages: Vec<Message>, max_num_turns: usize) -> Self {
        Self {
            messages,
            max_num_turns,
            context: Vec::new(),
            analyst,
            interview: None,
            sections: Vec::new(),
        }
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn append_context(&mut self, blocks: impl IntoIterator<Item = String>) {
        self.context.extend(blocks);
    }

    pub fn append_sections(&mut self, sections: impl IntoIterator<Item = String>) {
        self.sections.extend(sections);
    }
}

/// 研究总流程的状态
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchState {
    pub topic: String,
    pub max_analysts: usize,
    pub human_analyst_feedback: Option<String>,
    pub analysts: Vec<Analyst>,
    sections: Vec<String>,
    pub introduction: Option<String>,
    pub content: Option<String>,
    pub conclusion: Option<String>,
    pub final_report: Option<String>,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, max_analysts: usize) -> Self {
        Self {
            topic: topic.into(),
            max_analysts,
            ..Default::default()
        }
    }

    pub fn has_feedback(&self) -> bool {
        feedback_present(&self.human_analyst_feedback)
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn append_sections(&mut self, sections: impl IntoIterator<Item = String>) {
        self.sections.extend(sections);
    }
}

/// 派发给单个访谈实例的初始输入
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewSeed {
    pub analyst: Analyst,
    pub messages: Vec<Message>,
}

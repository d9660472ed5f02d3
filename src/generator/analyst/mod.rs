//! 分析师生成与人工反馈关口

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generator::context::GeneratorContext;
use crate::generator::graph::{END, Edge, START, StepGraph};
use crate::generator::prompts::{self, ANALYST_INSTRUCTIONS, ANALYST_REQUEST};
use crate::generator::state::GenerationState;
use crate::types::{Analyst, Message};

/// 按主题生成分析师画像，反馈（如有）一并交给模型参考
pub async fn create_analysts(
    ctx: &GeneratorContext,
    topic: &str,
    max_analysts: usize,
    feedback: Option<&str>,
) -> Result<Vec<Analyst>> {
    let max_analysts_text = max_analysts.to_string();
    let system_prompt = prompts::render(
        ANALYST_INSTRUCTIONS,
        &[
            ("topic", topic),
            ("human_analyst_feedback", feedback.unwrap_or_default()),
            ("max_analysts", &max_analysts_text),
        ],
    );

    let perspectives = ctx
        .llm
        .extract_perspectives(&system_prompt, &[Message::human(ANALYST_REQUEST)])
        .await?;

    let analysts = perspectives.analysts;
    tracing::info!(count = analysts.len(), "analysts generated");
    if analysts.len() != max_analysts {
        tracing::warn!(
            requested = max_analysts,
            produced = analysts.len(),
            "model returned a different number of analysts"
        );
    }
    println!("👥 已生成 {} 位分析师", analysts.len());

    Ok(analysts)
}

/// 人工反馈关口，本身不做任何计算，只作为暂停点存在
pub async fn human_feedback() -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRoute {
    CreateAnalysts,
    End,
}

/// 独立分析师生成流程的反馈路由：有反馈则重新生成，否则结束
pub fn should_continue_analyst_generation(state: &GenerationState) -> GenerationRoute {
    if state.has_feedback() {
        GenerationRoute::CreateAnalysts
    } else {
        GenerationRoute::End
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStep {
    CreateAnalysts,
    HumanFeedback,
}

impl fmt::Display for GenerationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStep::CreateAnalysts => write!(f, "create_analysts"),
            GenerationStep::HumanFeedback => write!(f, "human_feedback"),
        }
    }
}

/// 只生成分析师的流程：CreateAnalysts → [暂停] HumanFeedback → {CreateAnalysts | 结束}
pub struct AnalystGenerationGraph;

#[async_trait]
impl StepGraph for AnalystGenerationGraph {
    type State = GenerationState;
    type Step = GenerationStep;

    fn name(&self) -> &'static str {
        "analyst_generation"
    }

    fn entry(&self) -> GenerationStep {
        GenerationStep::CreateAnalysts
    }

    fn interrupt_before(&self, step: GenerationStep) -> bool {
        step == GenerationStep::HumanFeedback
    }

    async fn run_step(
        &self,
        ctx: &GeneratorContext,
        step: GenerationStep,
        state: &mut GenerationState,
    ) -> Result<()> {
        match step {
            GenerationStep::CreateAnalysts => {
                state.analysts = create_analysts(
                    ctx,
                    &state.topic,
                    state.max_analysts,
                    state.human_analyst_feedback.as_deref(),
                )
                .await?;
            }
            GenerationStep::HumanFeedback => human_feedback().await?,
        }
        Ok(())
    }

    fn next(&self, step: GenerationStep, state: &GenerationState) -> Result<Option<GenerationStep>> {
        Ok(match step {
            GenerationStep::CreateAnalysts => Some(GenerationStep::HumanFeedback),
            GenerationStep::HumanFeedback => match should_continue_analyst_generation(state) {
                GenerationRoute::CreateAnalysts => Some(GenerationStep::CreateAnalysts),
                GenerationRoute::End => None,
            },
        })
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::direct(START, GenerationStep::CreateAnalysts),
            Edge::direct(GenerationStep::CreateAnalysts, GenerationStep::HumanFeedback),
            Edge::conditional(GenerationStep::HumanFeedback, GenerationStep::CreateAnalysts),
            Edge::conditional(GenerationStep::HumanFeedback, END),
        ]
    }
}

#[cfg(test)]
mod tests;

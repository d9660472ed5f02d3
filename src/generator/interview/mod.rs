//! 单个分析师的访谈子流程
//!
//! AskQuestion → Search（网页 ∥ 百科）→ AnswerQuestion → {AskQuestion | SaveInterview} → WriteSection

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::generator::context::GeneratorContext;
use crate::generator::graph::{END, Edge, GraphExecutor, START, StepGraph};
use crate::generator::prompts::{
    self, ANSWER_INSTRUCTIONS, QUESTION_INSTRUCTIONS, SEARCH_INSTRUCTIONS,
    SECTION_WRITER_INSTRUCTIONS,
};
use crate::generator::state::{InterviewSeed, InterviewState};
use crate::search::{format_encyclopedia_docs, format_web_results};
use crate::types::message::EXPERT_NAME;
use crate::types::{Analyst, Message, get_buffer_string};

/// 分析师结束访谈时使用的固定语句
pub const CLOSING_PHRASE: &str = "Thank you so much for your help";

/// 根据人设与历史生成下一个问题
pub async fn generate_question(
    ctx: &GeneratorContext,
    analyst: &Analyst,
    messages: &[Message],
) -> Result<Message> {
    let system_prompt = prompts::render(QUESTION_INSTRUCTIONS, &[("goals", &analyst.persona())]);
    let question = ctx.llm.invoke(&system_prompt, messages).await?;
    tracing::debug!(analyst = %analyst.name, "question generated");
    Ok(Message::ai(question))
}

async fn search_query(ctx: &GeneratorContext, messages: &[Message]) -> Result<String> {
    let query = ctx
        .llm
        .extract_search_query(SEARCH_INSTRUCTIONS, messages)
        .await?;
    Ok(query.search_query)
}

/// 网页检索，返回一段格式化后的上下文
pub async fn search_web(ctx: &GeneratorContext, messages: &[Message]) -> Result<String> {
    let query = search_query(ctx, messages).await?;
    let max_results = ctx.config.search.web_max_results;
    let response = ctx
        .web_search
        .search(&query, max_results)
        .await
        .with_context(|| format!("Web search failed for query: {}", query))?;
    tracing::info!(query = %query, results = response.result_count(), "web search done");
    Ok(format_web_results(&response))
}

/// 百科检索，返回一段格式化后的上下文
pub async fn search_wikipedia(ctx: &GeneratorContext, messages: &[Message]) -> Result<String> {
    let query = search_query(ctx, messages).await?;
    let max_docs = ctx.config.search.wikipedia_max_docs;
    let docs = ctx
        .encyclopedia
        .load(&query, max_docs)
        .await
        .with_context(|| format!("Wikipedia search failed for query: {}", query))?;
    tracing::info!(query = %query, documents = docs.len(), "wikipedia search done");
    Ok(format_encyclopedia_docs(&docs))
}

/// 专家基于已收集的上下文回答
pub async fn generate_answer(
    ctx: &GeneratorContext,
    analyst: &Analyst,
    messages: &[Message],
    context: &[String],
) -> Result<Message> {
    let context_text = context.join("\n\n");
    let system_prompt = prompts::render(
        ANSWER_INSTRUCTIONS,
        &[("goals", &analyst.persona()), ("context", &context_text)],
    );
    let answer = ctx.llm.invoke(&system_prompt, messages).await?;
    Ok(Message::expert(answer))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewRoute {
    AskQuestion,
    SaveInterview,
}

/// 回答之后的路由
pub fn route_messages(messages: &[Message], max_num_turns: usize) -> Result<InterviewRoute> {
    let num_responses = messages.iter().filter(|m| m.is_from(EXPERT_NAME)).count();
    if num_responses >= max_num_turns {
        return Ok(InterviewRoute::SaveInterview);
    }

    if messages.len() < 2 {
        return Err(ResearchError::Precondition(format!(
            "routing needs the last question and answer, got {} message(s)",
            messages.len()
        ))
        .into());
    }

    let last_question = &messages[messages.len() - 2];
    if last_question.content().contains(CLOSING_PHRASE) {
        Ok(InterviewRoute::SaveInterview)
    } else {
        Ok(InterviewRoute::AskQuestion)
    }
}

/// 访谈记录
pub fn save_interview(messages: &[Message]) -> String {
    get_buffer_string(messages)
}

/// 基于检索上下文撰写章节
pub async fn write_section(
    ctx: &GeneratorContext,
    analyst: &Analyst,
    context: &[String],
) -> Result<String> {
    let system_prompt = prompts::render(
        SECTION_WRITER_INSTRUCTIONS,
        &[("focus", &analyst.description)],
    );
    let request = format!(
        "Use this source to write your section: {}",
        context.join("\n\n")
    );
    ctx.llm
        .invoke(&system_prompt, &[Message::human(request)])
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewStep {
    AskQuestion,
    Search,
    AnswerQuestion,
    SaveInterview,
    WriteSection,
}

impl fmt::Display for InterviewStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterviewStep::AskQuestion => "ask_question",
            InterviewStep::Search => "search",
            InterviewStep::AnswerQuestion => "answer_question",
            InterviewStep::SaveInterview => "save_interview",
            InterviewStep::WriteSection => "write_section",
        };
        write!(f, "{}", name)
    }
}

pub struct InterviewGraph;

#[async_trait]
impl StepGraph for InterviewGraph {
    type State = InterviewState;
    type Step = InterviewStep;

    fn name(&self) -> &'static str {
        "interview"
    }

    fn entry(&self) -> InterviewStep {
        InterviewStep::AskQuestion
    }

    async fn run_step(
        &self,
        ctx: &GeneratorContext,
        step: InterviewStep,
        state: &mut InterviewState,
    ) -> Result<()> {
        match step {
            InterviewStep::AskQuestion => {
                let question = generate_question(ctx, &state.analyst, &state.messages).await?;
                state.messages.push(question);
            }
            InterviewStep::Search => {
                let (web, wiki) = tokio::try_join!(
                    search_web(ctx, &state.messages),
                    search_wikipedia(ctx, &state.messages)
                )?;
                state.append_context([web, wiki]);
            }
            InterviewStep::AnswerQuestion => {
                let answer =
                    generate_answer(ctx, &state.analyst, &state.messages, state.context()).await?;
                state.messages.push(answer);
            }
            InterviewStep::SaveInterview => {
                state.interview = Some(save_interview(&state.messages));
            }
            InterviewStep::WriteSection => {
                let section = write_section(ctx, &state.analyst, state.context()).await?;
                state.append_sections([section]);
            }
        }
        Ok(())
    }

    fn next(&self, step: InterviewStep, state: &InterviewState) -> Result<Option<InterviewStep>> {
        Ok(match step {
            InterviewStep::AskQuestion => Some(InterviewStep::Search),
            InterviewStep::Search => Some(InterviewStep::AnswerQuestion),
            InterviewStep::AnswerQuestion => {
                match route_messages(&state.messages, state.max_num_turns)? {
                    InterviewRoute::AskQuestion => Some(InterviewStep::AskQuestion),
                    InterviewRoute::SaveInterview => Some(InterviewStep::SaveInterview),
                }
            }
            InterviewStep::SaveInterview => Some(InterviewStep::WriteSection),
            InterviewStep::WriteSection => None,
        })
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::direct(START, InterviewStep::AskQuestion),
            Edge::direct(InterviewStep::AskQuestion, "search_web"),
            Edge::direct(InterviewStep::AskQuestion, "search_wikipedia"),
            Edge::direct("search_web", InterviewStep::AnswerQuestion),
            Edge::direct("search_wikipedia", InterviewStep::AnswerQuestion),
            Edge::conditional(InterviewStep::AnswerQuestion, InterviewStep::AskQuestion),
            Edge::conditional(InterviewStep::AnswerQuestion, InterviewStep::SaveInterview),
            Edge::direct(InterviewStep::SaveInterview, InterviewStep::WriteSection),
            Edge::direct(InterviewStep::WriteSection, END),
        ]
    }
}

/// 跑完一次访谈，返回最终状态
pub async fn conduct_interview(ctx: &GeneratorContext, seed: InterviewSeed) -> Result<InterviewState> {
    let analyst_name = seed.analyst.name.clone();
    println!("🎤 开始访谈：{}", analyst_name);

    let state = InterviewState::new(
        seed.analyst,
        seed.messages,
        ctx.config.interview.max_num_turns,
    );
    let executor = GraphExecutor::ephemeral(InterviewGraph, ctx.clone());
    let state = executor
        .run_to_end(state)
        .await
        .with_context(|| format!("Interview with {} failed", analyst_name))?;

    println!("✅ 访谈完成：{}", analyst_name);
    Ok(state)
}

#[cfg(test)]
mod tests;

//! 访谈派发与报告组装

use anyhow::{Result, anyhow};

use crate::generator::context::GeneratorContext;
use crate::generator::interview::conduct_interview;
use crate::generator::prompts::{
    self, CONCLUSION_REQUEST, INTRO_CONCLUSION_INSTRUCTIONS, INTRODUCTION_REQUEST,
    REPORT_REQUEST, REPORT_WRITER_INSTRUCTIONS,
};
use crate::generator::state::{InterviewSeed, ResearchState};
use crate::types::Message;
use crate::utils::threads::do_parallel_with_limit;

const INSIGHTS_HEADER: &str = "## Insights";
const SOURCES_DELIMITER: &str = "\n## Sources\n";
const PART_SEPARATOR: &str = "\n\n---\n\n";

/// 研究流程在人工反馈之后的路由
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchRoute {
    CreateAnalysts,
    ConductInterviews(Vec<InterviewSeed>),
}

/// 访谈开场白
pub fn opening_message(topic: &str) -> Message {
    Message::human(format!(
        "So you said you were writing an article on {}?",
        topic
    ))
}

/// 有反馈时回到分析师生成，否则为每位分析师派发一次访谈
pub fn initiate_all_interviews(state: &ResearchState) -> ResearchRoute {
    if state.has_feedback() {
        return ResearchRoute::CreateAnalysts;
    }

    ResearchRoute::ConductInterviews(
        state
            .analysts
            .iter()
            .map(|analyst| InterviewSeed {
                analyst: analyst.clone(),
                messages: vec![opening_message(&state.topic)],
            })
            .collect(),
    )
}

/// 并发执行所有访谈，按派发顺序返回各自的章节；任一访谈失败即整体失败
pub async fn conduct_interviews(
    ctx: &GeneratorContext,
    seeds: Vec<InterviewSeed>,
) -> Result<Vec<String>> {
    let max_parallels = ctx.config.llm.max_parallels;
    println!(
        "🚀 启动 {} 场访谈，最大并发数：{}",
        seeds.len(),
        max_parallels
    );

    let futures: Vec<_> = seeds
        .into_iter()
        .map(|seed| {
            let ctx = ctx.clone();
            Box::pin(async move { conduct_interview(&ctx, seed).await })
        })
        .collect();

    let mut sections = Vec::new();
    for result in do_parallel_with_limit(futures, max_parallels).await {
        sections.extend(result?.sections().iter().cloned());
    }
    Ok(sections)
}

/// 章节之间以空行连接
pub fn format_sections(sections: &[String]) -> String {
    sections.join("\n\n")
}

/// 主体报告
pub async fn write_report(ctx: &GeneratorContext, topic: &str, sections: &[String]) -> Result<String> {
    let formatted = format_sections(sections);
    let system_prompt = prompts::render(
        REPORT_WRITER_INSTRUCTIONS,
        &[("topic", topic), ("context", &formatted)],
    );
    let content = ctx
        .llm
        .invoke(&system_prompt, &[Message::human(REPORT_REQUEST)])
        .await?;
    tracing::info!(chars = content.len(), "report body written");
    Ok(content)
}

async fn write_intro_or_conclusion(
    ctx: &GeneratorContext,
    topic: &str,
    sections: &[String],
    request: &str,
) -> Result<String> {
    let formatted = format_sections(sections);
    let system_prompt = prompts::render(
        INTRO_CONCLUSION_INSTRUCTIONS,
        &[("topic", topic), ("formatted_str_sections", &formatted)],
    );
    ctx.llm
        .invoke(&system_prompt, &[Message::human(request)])
        .await
}

pub async fn write_introduction(
    ctx: &GeneratorContext,
    topic: &str,
    sections: &[String],
) -> Result<String> {
    write_intro_or_conclusion(ctx, topic, sections, INTRODUCTION_REQUEST).await
}

pub async fn write_conclusion(
    ctx: &GeneratorContext,
    topic: &str,
    sections: &[String],
) -> Result<String> {
    write_intro_or_conclusion(ctx, topic, sections, CONCLUSION_REQUEST).await
}

/// 拆出主体中的来源部分，分隔符必须恰好出现一次
fn split_sources(content: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = content.split(SOURCES_DELIMITER).collect();
    match parts.as_slice() {
        [body, sources] => Ok((*body, *sources)),
        _ => Err(anyhow!(
            "expected exactly one sources header, found {}",
            parts.len() - 1
        )),
    }
}

/// 组装最终报告：引言、主体、结论以分隔线相连，来源（如有）附在最后
///
/// 先按来源分隔符拆分，再去掉主体开头的 `## Insights`，标题后紧跟来源时分隔符不受影响。
pub fn finalize_report(introduction: &str, content: &str, conclusion: &str) -> String {
    let (body, sources) = match split_sources(content) {
        Ok((body, sources)) => (body, Some(sources)),
        Err(e) => {
            tracing::debug!(reason = %e, "report has no separable sources section");
            (content, None)
        }
    };
    let body = body
        .strip_prefix(INSIGHTS_HEADER)
        .map(str::trim_start)
        .unwrap_or(body);

    let mut final_report = format!(
        "{}{}{}{}{}",
        introduction, PART_SEPARATOR, body, PART_SEPARATOR, conclusion
    );
    if let Some(sources) = sources {
        final_report.push_str("\n\n## Sources\n");
        final_report.push_str(sources);
    }
    final_report
}

#[cfg(test)]
mod tests;

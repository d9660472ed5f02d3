// 研究报告总流程
// 1. CreateAnalysts：按主题生成分析师
// 2. HumanFeedback：暂停等待人工反馈，反馈非空则回到 1
// 3. ConductInterviews：每位分析师一场访谈，并发执行，章节汇总
// 4. WriteReportParts：主体、引言、结论三者互不依赖，并发撰写
// 5. FinalizeReport：拼接最终报告

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generator::analyst::{create_analysts, human_feedback};
use crate::generator::context::GeneratorContext;
use crate::generator::graph::{END, Edge, START, StepGraph};
use crate::generator::report::{
    ResearchRoute, conduct_interviews, finalize_report, initiate_all_interviews, write_conclusion,
    write_introduction, write_report,
};
use crate::generator::state::ResearchState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchStep {
    CreateAnalysts,
    HumanFeedback,
    ConductInterviews,
    WriteReportParts,
    FinalizeReport,
}

impl fmt::Display for ResearchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchStep::CreateAnalysts => "create_analysts",
            ResearchStep::HumanFeedback => "human_feedback",
            ResearchStep::ConductInterviews => "conduct_interview",
            ResearchStep::WriteReportParts => "write_report_parts",
            ResearchStep::FinalizeReport => "finalize_report",
        };
        write!(f, "{}", name)
    }
}

pub struct ResearchGraph;

#[async_trait]
impl StepGraph for ResearchGraph {
    type State = ResearchState;
    type Step = ResearchStep;

    fn name(&self) -> &'static str {
        "research"
    }

    fn entry(&self) -> ResearchStep {
        ResearchStep::CreateAnalysts
    }

    fn interrupt_before(&self, step: ResearchStep) -> bool {
        step == ResearchStep::HumanFeedback
    }

    async fn run_step(
        &self,
        ctx: &GeneratorContext,
        step: ResearchStep,
        state: &mut ResearchState,
    ) -> Result<()> {
        match step {
            ResearchStep::CreateAnalysts => {
                state.analysts = create_analysts(
                    ctx,
                    &state.topic,
                    state.max_analysts,
                    state.human_analyst_feedback.as_deref(),
                )
                .await?;
            }
            ResearchStep::HumanFeedback => human_feedback().await?,
            ResearchStep::ConductInterviews => {
                // 路由已保证此处没有待处理的反馈
                if let ResearchRoute::ConductInterviews(seeds) = initiate_all_interviews(state) {
                    let sections = conduct_interviews(ctx, seeds).await?;
                    state.append_sections(sections);
                }
            }
            ResearchStep::WriteReportParts => {
                println!("📝 正在撰写报告主体、引言与结论...");
                let sections = state.sections();
                let (content, introduction, conclusion) = tokio::try_join!(
                    write_report(ctx, &state.topic, sections),
                    write_introduction(ctx, &state.topic, sections),
                    write_conclusion(ctx, &state.topic, sections)
                )?;
                state.content = Some(content);
                state.introduction = Some(introduction);
                state.conclusion = Some(conclusion);
            }
            ResearchStep::FinalizeReport => {
                let final_report = finalize_report(
                    state.introduction.as_deref().unwrap_or_default(),
                    state.content.as_deref().unwrap_or_default(),
                    state.conclusion.as_deref().unwrap_or_default(),
                );
                state.final_report = Some(final_report);
            }
        }
        Ok(())
    }

    fn next(&self, step: ResearchStep, state: &ResearchState) -> Result<Option<ResearchStep>> {
        Ok(match step {
            ResearchStep::CreateAnalysts => Some(ResearchStep::HumanFeedback),
            ResearchStep::HumanFeedback => match initiate_all_interviews(state) {
                ResearchRoute::CreateAnalysts => Some(ResearchStep::CreateAnalysts),
                ResearchRoute::ConductInterviews(_) => Some(ResearchStep::ConductInterviews),
            },
            ResearchStep::ConductInterviews => Some(ResearchStep::WriteReportParts),
            ResearchStep::WriteReportParts => Some(ResearchStep::FinalizeReport),
            ResearchStep::FinalizeReport => None,
        })
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::direct(START, ResearchStep::CreateAnalysts),
            Edge::direct(ResearchStep::CreateAnalysts, ResearchStep::HumanFeedback),
            Edge::conditional(ResearchStep::HumanFeedback, ResearchStep::CreateAnalysts),
            Edge::conditional(ResearchStep::HumanFeedback, ResearchStep::ConductInterviews),
            Edge::direct(ResearchStep::ConductInterviews, "write_report"),
            Edge::direct(ResearchStep::ConductInterviews, "write_introduction"),
            Edge::direct(ResearchStep::ConductInterviews, "write_conclusion"),
            Edge::direct("write_report", ResearchStep::FinalizeReport),
            Edge::direct("write_introduction", ResearchStep::FinalizeReport),
            Edge::direct("write_conclusion", ResearchStep::FinalizeReport),
            Edge::direct(ResearchStep::FinalizeReport, END),
        ]
    }
}

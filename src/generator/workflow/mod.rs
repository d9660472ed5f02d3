use crate::config::Config;
use crate::generator::analyst::AnalystGenerationGraph;
use crate::generator::context::GeneratorContext;
use crate::generator::graph::{GraphExecutor, RunOutcome, RunStatus, StepGraph};
use crate::generator::interview::InterviewGraph;
use crate::generator::outlet;
use crate::generator::research::{ResearchGraph, ResearchStep};
use crate::generator::state::ResearchState;
use crate::llm::LLMClient;
use crate::types::Analyst;

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

/// 在人工反馈节点提供反馈的来源
pub trait FeedbackProvider {
    /// 返回 `None` 或空文本表示继续
    fn next_feedback(&mut self, analysts: &[Analyst]) -> Result<Option<String>>;
}

/// 命令行反馈：首次暂停使用预置反馈，之后在交互模式下读取标准输入
pub struct ConsoleFeedback {
    initial: Option<String>,
    interactive: bool,
}

impl ConsoleFeedback {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial: config.initial_feedback.clone(),
            interactive: config.interactive,
        }
    }
}

impl FeedbackProvider for ConsoleFeedback {
    fn next_feedback(&mut self, _analysts: &[Analyst]) -> Result<Option<String>> {
        if let Some(feedback) = self.initial.take() {
            return Ok(Some(feedback));
        }
        if !self.interactive {
            return Ok(None);
        }

        print!("💬 请输入对分析师的反馈（直接回车表示继续）: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read feedback from stdin")?;
        Ok(Some(line.trim().to_string()))
    }
}

/// 预置的反馈序列，用完后视为继续
impl FeedbackProvider for VecDeque<String> {
    fn next_feedback(&mut self, _analysts: &[Analyst]) -> Result<Option<String>> {
        Ok(self.pop_front())
    }
}

fn print_analysts(analysts: &[Analyst]) {
    println!("\n👥 分析师列表:");
    for analyst in analysts {
        println!("Name: {}", analyst.name);
        println!("Affiliation: {}", analyst.affiliation);
        println!("Role: {}", analyst.role);
        println!("Description: {}", analyst.description);
        println!("{}", "-".repeat(50));
    }
}

fn print_trace(outcome: &RunOutcome<ResearchStep>) {
    for record in &outcome.trace {
        println!("Executing: {}", record.step);
        tracing::debug!(step = %record.step, elapsed_ms = record.duration.as_millis() as u64, "step finished");
    }
}

/// 线程已有未完成的检查点时从中恢复，否则从头开始
async fn start_or_resume(
    context: &GeneratorContext,
    executor: &GraphExecutor<ResearchGraph>,
    thread_id: &str,
) -> Result<RunOutcome<ResearchStep>> {
    let initial = ResearchState::new(&context.config.topic, context.config.max_analysts);
    if !context
        .has_memory_data(executor.graph().name(), thread_id)
        .await
    {
        return executor.invoke(thread_id, initial).await;
    }

    let checkpoint = executor.get_state(thread_id).await?;
    if !checkpoint.is_complete() && checkpoint.state.topic != context.config.topic {
        tracing::warn!(
            thread_id,
            stored = %checkpoint.state.topic,
            requested = %context.config.topic,
            "resuming with the topic stored in the checkpoint"
        );
    }

    match checkpoint.next {
        // 暂停在反馈前：直接进入反馈循环
        Some(ResearchStep::HumanFeedback) => {
            println!("♻️ 恢复线程 {}，等待分析师反馈", thread_id);
            Ok(RunOutcome {
                status: RunStatus::Interrupted {
                    before: ResearchStep::HumanFeedback,
                },
                trace: Vec::new(),
            })
        }
        Some(step) => {
            println!("♻️ 恢复线程 {}，从步骤 {} 继续", thread_id, step);
            executor.resume(thread_id).await
        }
        None => {
            println!("🔄 线程 {} 已完成，重新开始", thread_id);
            executor.invoke(thread_id, initial).await
        }
    }
}

/// 驱动研究流程：运行到暂停点，注入反馈并恢复，直到完成
///
/// 同一线程标识下存在未完成的检查点时，从检查点继续而不是重新开始。
pub async fn run_research<F>(
    context: &GeneratorContext,
    thread_id: &str,
    feedback: &mut F,
) -> Result<ResearchState>
where
    F: FeedbackProvider,
{
    let executor = GraphExecutor::new(ResearchGraph, context.clone());

    let mut outcome = start_or_resume(context, &executor, thread_id).await?;
    print_trace(&outcome);

    while outcome.is_interrupted() {
        let checkpoint = executor.get_state(thread_id).await?;
        print_analysts(&checkpoint.state.analysts);

        let value = feedback
            .next_feedback(&checkpoint.state.analysts)?
            .unwrap_or_default();
        if value.is_empty() {
            println!("▶️ 无反馈，开始访谈");
        } else {
            println!("🔁 收到反馈，重新生成分析师: {}", value);
        }
        executor
            .update_state(thread_id, |state| {
                state.human_analyst_feedback = Some(value);
            })
            .await?;

        outcome = executor.resume(thread_id).await?;
        print_trace(&outcome);
    }

    Ok(executor.get_state(thread_id).await?.state)
}

/// 导出三个流程图的 mermaid 文本
pub fn export_graphs(context: &GeneratorContext) -> Result<Vec<PathBuf>> {
    let graph_dir = context.config.graph_dir();
    fs::create_dir_all(&graph_dir)?;

    let graphs = [
        (
            AnalystGenerationGraph.name(),
            GraphExecutor::ephemeral(AnalystGenerationGraph, context.clone()).to_mermaid(),
        ),
        (
            InterviewGraph.name(),
            GraphExecutor::ephemeral(InterviewGraph, context.clone()).to_mermaid(),
        ),
        (
            ResearchGraph.name(),
            GraphExecutor::ephemeral(ResearchGraph, context.clone()).to_mermaid(),
        ),
    ];

    let mut written = Vec::new();
    for (name, mermaid) in graphs {
        let path = graph_dir.join(format!("{}.mmd", name));
        fs::write(&path, mermaid)
            .with_context(|| format!("Failed to write graph {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// 启动研究报告生成工作流
pub async fn launch(config: &Config) -> Result<()> {
    config.validate()?;
    let started = Instant::now();

    // 启动时检查模型连接
    let llm = LLMClient::new(config.llm.clone())?;
    llm.check_connection().await?;
    let context = GeneratorContext::with_llm_client(config.clone(), llm)?;

    if config.export_graphs {
        for path in export_graphs(&context)? {
            println!("🗺️ 已导出流程图: {}", path.display());
        }
    }

    let thread_id = config
        .thread_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("🚀 开始调研：{}（thread: {}）", config.topic, thread_id);
    if let Some(dir) = context.memory.read().await.persist_dir() {
        println!("💾 检查点目录: {}", dir.display());
    }

    let mut feedback = ConsoleFeedback::from_config(config);
    let state = run_research(&context, &thread_id, &mut feedback).await?;

    if let Some(report) = state.final_report.as_deref() {
        println!("\n{}\n", report);
    }
    outlet::save(&config.output_path, &state).await?;

    tracing::debug!(stats = ?context.get_memory_stats().await, "checkpoint usage");
    println!("⏱️ 总耗时: {:.2}秒", started.elapsed().as_secs_f64());
    Ok(())
}

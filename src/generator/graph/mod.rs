//! 显式状态机执行器
//!
//! 每个流程图以 [`StepGraph`] 描述步骤、路由与暂停点，由 [`GraphExecutor`] 驱动执行。
//! 启用检查点时，每个步骤结束后以及在暂停点前都会写入一份 [`Checkpoint`]，
//! 恢复执行就是读取快照并从其中记录的下一步继续。

use std::fmt::{Debug, Display};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::ResearchError;
use crate::generator::context::GeneratorContext;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

/// 流程图中的一条边，用于导出 mermaid 文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub conditional: bool,
}

impl Edge {
    pub fn direct(from: impl ToString, to: impl ToString) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            conditional: false,
        }
    }

    pub fn conditional(from: impl ToString, to: impl ToString) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            conditional: true,
        }
    }
}

/// 流程图定义
#[async_trait]
pub trait StepGraph: Send + Sync {
    type State: Serialize + DeserializeOwned + Clone + Send + Sync;
    type Step: Copy + Eq + Debug + Display + Serialize + DeserializeOwned + Send + Sync;

    /// 流程图名称，同时作为检查点的作用域
    fn name(&self) -> &'static str;

    fn entry(&self) -> Self::Step;

    /// 是否在执行该步骤前暂停
    fn interrupt_before(&self, _step: Self::Step) -> bool {
        false
    }

    async fn run_step(
        &self,
        ctx: &GeneratorContext,
        step: Self::Step,
        state: &mut Self::State,
    ) -> Result<()>;

    /// 路由：返回 `None` 表示流程结束
    fn next(&self, step: Self::Step, state: &Self::State) -> Result<Option<Self::Step>>;

    fn edges(&self) -> Vec<Edge>;
}

/// 某个线程的运行快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<S, P> {
    pub thread_id: String,
    pub graph: String,
    pub state: S,
    /// 下一个待执行的步骤，`None` 表示已经完成
    pub next: Option<P>,
    pub updated_at: DateTime<Utc>,
}

impl<S, P> Checkpoint<S, P> {
    pub fn is_complete(&self) -> bool {
        self.next.is_none()
    }
}

/// 一个已执行步骤的记录
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord<P> {
    pub step: P,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus<P> {
    /// 在该步骤前暂停，等待外部输入
    Interrupted { before: P },
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<P> {
    pub status: RunStatus<P>,
    pub trace: Vec<StepRecord<P>>,
}

impl<P: Copy> RunOutcome<P> {
    pub fn is_interrupted(&self) -> bool {
        matches!(self.status, RunStatus::Interrupted { .. })
    }

    pub fn interrupted_before(&self) -> Option<P> {
        match self.status {
            RunStatus::Interrupted { before } => Some(before),
            RunStatus::Completed => None,
        }
    }
}

type GraphCheckpoint<G> = Checkpoint<<G as StepGraph>::State, <G as StepGraph>::Step>;

/// 流程图执行器
pub struct GraphExecutor<G: StepGraph> {
    graph: G,
    ctx: GeneratorContext,
    checkpointing: bool,
}

impl<G: StepGraph> GraphExecutor<G> {
    /// 带检查点的执行器，快照写入上下文中的 Memory
    pub fn new(graph: G, ctx: GeneratorContext) -> Self {
        Self {
            graph,
            ctx,
            checkpointing: true,
        }
    }

    /// 不保存检查点的执行器，用于一次跑完的子流程
    pub fn ephemeral(graph: G, ctx: GeneratorContext) -> Self {
        Self {
            graph,
            ctx,
            checkpointing: false,
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// 从入口开始运行，直到暂停点或结束
    pub async fn invoke(&self, thread_id: &str, state: G::State) -> Result<RunOutcome<G::Step>> {
        let entry = self.graph.entry();
        let (_, outcome) = self
            .drive(Some(thread_id), state, Some(entry), false)
            .await?;
        Ok(outcome)
    }

    /// 不经过检查点一次跑完，返回最终状态
    pub async fn run_to_end(&self, state: G::State) -> Result<G::State> {
        let entry = self.graph.entry();
        let (state, outcome) = self.drive(None, state, Some(entry), false).await?;
        match outcome.status {
            RunStatus::Completed => Ok(state),
            RunStatus::Interrupted { before } => Err(ResearchError::Precondition(format!(
                "graph `{}` paused before `{}` without a checkpoint to resume from",
                self.graph.name(),
                before
            ))
            .into()),
        }
    }

    /// 修改暂停中的快照，例如注入人工反馈
    pub async fn update_state<F>(&self, thread_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut G::State),
    {
        let mut checkpoint = self.get_state(thread_id).await?;
        update(&mut checkpoint.state);
        checkpoint.updated_at = Utc::now();
        self.ctx
            .store_to_memory(self.graph.name(), thread_id, &checkpoint)
            .await
    }

    /// 从快照记录的下一步继续执行，暂停点本身不再拦截
    pub async fn resume(&self, thread_id: &str) -> Result<RunOutcome<G::Step>> {
        let checkpoint = self.get_state(thread_id).await?;
        let Some(next) = checkpoint.next else {
            return Err(ResearchError::Checkpoint(format!(
                "thread `{}` of graph `{}` has already completed",
                thread_id,
                self.graph.name()
            ))
            .into());
        };

        tracing::info!(graph = self.graph.name(), thread_id, step = %next, "resuming");
        let (_, outcome) = self
            .drive(Some(thread_id), checkpoint.state, Some(next), true)
            .await?;
        Ok(outcome)
    }

    /// 读取线程的最新快照
    pub async fn get_state(&self, thread_id: &str) -> Result<GraphCheckpoint<G>> {
        self.ctx
            .get_from_memory::<GraphCheckpoint<G>>(self.graph.name(), thread_id)
            .await
            .with_context(|| format!("Failed to load checkpoint for thread {}", thread_id))?
            .ok_or_else(|| {
                ResearchError::Checkpoint(format!(
                    "no checkpoint for thread `{}` of graph `{}`",
                    thread_id,
                    self.graph.name()
                ))
                .into()
            })
    }

    /// 导出静态流程图
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        for edge in self.graph.edges() {
            let arrow = if edge.conditional { "-.->" } else { "-->" };
            lines.push(format!("    {} {} {}", edge.from, arrow, edge.to));
        }
        lines.join("\n")
    }

    async fn save_checkpoint(
        &self,
        thread_id: Option<&str>,
        state: &G::State,
        next: Option<G::Step>,
    ) -> Result<()> {
        let Some(thread_id) = thread_id.filter(|_| self.checkpointing) else {
            return Ok(());
        };
        let checkpoint = Checkpoint {
            thread_id: thread_id.to_string(),
            graph: self.graph.name().to_string(),
            state: state.clone(),
            next,
            updated_at: Utc::now(),
        };
        self.ctx
            .store_to_memory(self.graph.name(), thread_id, &checkpoint)
            .await
            .with_context(|| format!("Failed to save checkpoint for thread {}", thread_id))
    }

    async fn drive(
        &self,
        thread_id: Option<&str>,
        mut state: G::State,
        mut current: Option<G::Step>,
        mut resuming: bool,
    ) -> Result<(G::State, RunOutcome<G::Step>)> {
        let mut trace = Vec::new();

        while let Some(step) = current {
            if !resuming && self.graph.interrupt_before(step) {
                self.save_checkpoint(thread_id, &state, Some(step)).await?;
                tracing::info!(graph = self.graph.name(), step = %step, "interrupted");
                return Ok((
                    state,
                    RunOutcome {
                        status: RunStatus::Interrupted { before: step },
                        trace,
                    },
                ));
            }
            resuming = false;

            tracing::debug!(graph = self.graph.name(), step = %step, "running step");
            let started = Instant::now();
            self.graph
                .run_step(&self.ctx, step, &mut state)
                .await
                .with_context(|| {
                    format!("Step `{}` of graph `{}` failed", step, self.graph.name())
                })?;
            trace.push(StepRecord {
                step,
                duration: started.elapsed(),
            });

            current = self.graph.next(step, &state)?;
            self.save_checkpoint(thread_id, &state, current).await?;
        }

        tracing::info!(graph = self.graph.name(), steps = trace.len(), "completed");
        Ok((
            state,
            RunOutcome {
                status: RunStatus::Completed,
                trace,
            },
        ))
    }
}

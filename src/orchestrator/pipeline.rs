//! 链式解题流水线 - 编排层
//!
//! ## 职责
//!
//! 从起始地址开始，一道接一道地处理题目，直到服务端不再给出下一题。
//!
//! ## 核心功能
//!
//! 1. **任务准备**：委托 [`TaskPreparer`] 渲染页面、提取任务、下载文件
//! 2. **全新状态**：每道题用新的种子对话创建 [`AgentState`]
//! 3. **流程调度**：委托 [`AgentLoop`] 运行到终止状态
//! 4. **链式前进**：只有 `next_url` 从上一道题带到下一道题
//! 5. **统计输出**：每道题一条 [`TaskSummary`]，写入运行日志

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::services::TaskLogWriter;
use crate::utils::logging::log_task_start;
use crate::workflow::{seed_conversation, AgentLoop, AgentState, Identity, StopReason, TaskCtx};

use super::task_preparer::TaskPreparer;

/// 单道题的结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// 解题循环运行到了终止状态
    Finished(StopReason),
    /// 页面渲染或任务提取失败，没有进入解题循环
    PreparationFailed(String),
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Finished(reason) => write!(f, "{}", reason),
            TaskStatus::PreparationFailed(e) => write!(f, "任务准备失败: {}", e),
        }
    }
}

/// 单道题的处理摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    /// 链上序号（从1开始）
    pub task_index: usize,
    pub url: String,
    pub status: TaskStatus,
    pub iterations: u32,
    pub attempts: u32,
    pub next_url: Option<String>,
}

impl TaskSummary {
    pub fn is_solved(&self) -> bool {
        self.status == TaskStatus::Finished(StopReason::Accepted)
    }
}

/// 整条链的处理报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub tasks: Vec<TaskSummary>,
}

impl ChainReport {
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn solved(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_solved()).count()
    }
}

/// 链式解题流水线
pub struct Pipeline {
    preparer: Arc<dyn TaskPreparer>,
    agent: AgentLoop,
    identity: Identity,
    log_writer: Option<TaskLogWriter>,
}

impl Pipeline {
    pub fn new(preparer: Arc<dyn TaskPreparer>, agent: AgentLoop, identity: Identity) -> Self {
        Self {
            preparer,
            agent,
            identity,
            log_writer: None,
        }
    }

    /// 每道题结束后向运行日志追加一行
    pub fn with_log_writer(mut self, writer: TaskLogWriter) -> Self {
        self.log_writer = Some(writer);
        self
    }

    /// 从起始地址开始处理整条链
    pub async fn run(&self, start_url: &str) -> ChainReport {
        let mut report = ChainReport::default();
        let mut current = Some(start_url.to_string());

        while let Some(url) = current.take() {
            let ctx = TaskCtx::new(report.tasks.len() + 1, url);
            let summary = self.process_task(&ctx).await;

            self.record(&summary);
            current = match &summary.status {
                TaskStatus::Finished(_) => summary.next_url.clone(),
                TaskStatus::PreparationFailed(_) => None,
            };
            report.tasks.push(summary);
        }

        info!("🔚 链已结束，共处理 {} 道题", report.total());
        report
    }

    /// 处理一道题：准备 → 全新状态 → 解题循环
    async fn process_task(&self, ctx: &TaskCtx) -> TaskSummary {
        log_task_start(ctx.task_index, &ctx.url);

        // 超时从开始处理这道题算起，包含准备阶段
        let started_at = Instant::now();

        let task = match self.preparer.prepare(ctx).await {
            Ok(task) => task,
            Err(e) => {
                error!("{} ❌ 任务准备失败: {:#}", ctx, e);
                return TaskSummary {
                    task_index: ctx.task_index,
                    url: ctx.url.clone(),
                    status: TaskStatus::PreparationFailed(format!("{:#}", e)),
                    iterations: 0,
                    attempts: 0,
                    next_url: None,
                };
            }
        };

        let state = AgentState::new(
            seed_conversation(&task, &self.identity),
            started_at,
            self.agent.config(),
        );
        let state = self.agent.run(state, ctx).await;

        let status = match state.stop_reason() {
            Some(reason) => TaskStatus::Finished(reason.clone()),
            None => TaskStatus::Finished(StopReason::BudgetExhausted),
        };

        match state.next_url() {
            Some(next) => info!("{} ➡️ 下一题: {}", ctx, next),
            None => info!("{} 没有下一题", ctx),
        }

        TaskSummary {
            task_index: ctx.task_index,
            url: ctx.url.clone(),
            status,
            iterations: state.iterations_used(),
            attempts: state.retry_count(),
            next_url: state.next_url().map(str::to_string),
        }
    }

    fn record(&self, summary: &TaskSummary) {
        let Some(writer) = &self.log_writer else {
            return;
        };
        if let Err(e) = writer.write(
            summary.task_index,
            &summary.url,
            &summary.status.to_string(),
            summary.iterations,
            summary.attempts,
            summary.next_url.as_deref(),
        ) {
            warn!("写入运行日志失败: {:#}", e);
        }
    }
}

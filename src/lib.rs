//! # Quiz Chain Solver
//!
//! 一个用工具调用型 LLM 链式解答在线测验题的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动无头浏览器或连接调试端口
//! - `infrastructure/` - 持有稀缺资源（Browser），只暴露能力
//! - `PageRenderer` - 唯一的 Browser owner，提供 render() 能力
//!
//! ### ② 业务能力层（Services / Tools）
//! - `services/` - 描述"我能做什么"，只处理单个任务
//! - `SolverClient` - 解题模型（带工具目录的对话补全）
//! - `LlmService` - 从题目页面提取任务
//! - `LocalToolbox` - 下载 / 执行代码 / 媒体 / 提交
//! - `tools/` - 工具目录、参数校验与分发
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整解题流程
//! - `AgentState` - 单道题独占的状态
//! - `SubmissionEvaluator` - 接受 / 前进 / 重试 / 放弃
//! - `AgentLoop` - 模型 → 工具 → 模型，直到终止
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 链式处理，直到没有下一题
//! - `orchestrator/app` - 组装资源，输出统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod tools;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{AgentConfig, Config};
pub use error::{AppError, AppResult};
pub use infrastructure::PageRenderer;
pub use models::{Message, PreparedTask, SubmissionOutcome, TaskDescriptor, ToolCall};
pub use orchestrator::{App, ChainReport, Pipeline, TaskPreparer, TaskStatus, TaskSummary};
pub use services::{ChatModel, SolverClient};
pub use tools::{ToolDispatcher, ToolName, ToolRegistry, Toolbox};
pub use workflow::{AgentLoop, AgentState, StopReason, TaskCtx};

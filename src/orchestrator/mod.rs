//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责链式调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 管理浏览器资源（Browser、PageRenderer）
//! - 输出全局统计信息
//!
//! ### `pipeline` - 链式解题流水线
//! - 一道接一道地处理题目，直到没有下一题
//! - 每道题创建全新的 AgentState
//! - 记录每道题的摘要
//!
//! ### `task_preparer` - 任务准备
//! - 渲染页面 → 提取任务 → 下载文件
//!
//! ## 层次关系
//!
//! ```text
//! app (组装资源)
//!     ↓
//! pipeline (处理整条链)
//!     ↓
//! workflow::AgentLoop (处理单道题)
//!     ↓
//! tools / services (能力层：模型 / 渲染 / 下载 / 执行 / 提交)
//!     ↓
//! infrastructure (基础设施：PageRenderer)
//! ```

pub mod app;
pub mod pipeline;
pub mod task_preparer;

// 重新导出主要类型
pub use app::App;
pub use pipeline::{ChainReport, Pipeline, TaskStatus, TaskSummary};
pub use task_preparer::{QuizTaskPreparer, TaskPreparer};

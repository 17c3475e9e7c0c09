//! 任务处理上下文
//!
//! 封装"我正在处理链上的第几道题"这一信息

use std::fmt::Display;

/// 任务处理上下文
///
/// 只用于日志前缀
#[derive(Debug, Clone)]
pub struct TaskCtx {
    /// 任务在链上的序号（从1开始）
    pub task_index: usize,

    /// 题目地址
    pub url: String,
}

impl TaskCtx {
    /// 创建新的任务上下文
    pub fn new(task_index: usize, url: impl Into<String>) -> Self {
        Self {
            task_index,
            url: url.into(),
        }
    }
}

impl Display for TaskCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 #{}]", self.task_index)
    }
}

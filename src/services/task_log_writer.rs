//! 运行日志写入服务 - 业务能力层
//!
//! 只负责"往运行日志追加一行任务结果"能力，不关心流程

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// 运行日志写入服务
///
/// 职责：
/// - 每道题结束后向运行日志追加一行
/// - 只处理单个任务的记录
/// - 不关心流程顺序
pub struct TaskLogWriter {
    log_file_path: String,
}

impl TaskLogWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            log_file_path: path.into(),
        }
    }

    /// 追加一道题的结果
    ///
    /// # 参数
    /// - `task_index`: 任务序号（从1开始）
    /// - `url`: 题目地址
    /// - `outcome`: 结束原因
    /// - `iterations`: 用掉的轮数
    /// - `attempts`: 提交次数
    /// - `next_url`: 下一题地址
    pub fn write(
        &self,
        task_index: usize,
        url: &str,
        outcome: &str,
        iterations: u32,
        attempts: u32,
        next_url: Option<&str>,
    ) -> Result<()> {
        debug!("写入运行日志: 任务 {} | {}", task_index, outcome);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .with_context(|| format!("无法打开日志文件: {}", self.log_file_path))?;

        let line = format!(
            "[{}] 任务 #{} | {} | {} | 轮数 {} | 提交 {} | 下一题: {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            task_index,
            url,
            outcome,
            iterations,
            attempts,
            next_url.unwrap_or("-")
        );

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

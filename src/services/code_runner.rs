//! 代码执行服务 - 业务能力层
//!
//! 只负责"在工作目录里运行一段 Python 代码 / 安装依赖"能力

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::CodeOutput;
use crate::utils::truncate_text;

/// 输出截断长度（字符）
const MAX_OUTPUT_CHARS: usize = 10_000;
/// 代码写入的文件名
const RUNNER_FILE: &str = "runner.py";

/// 代码执行服务
pub struct CodeRunner {
    work_dir: PathBuf,
    python_command: Vec<String>,
    dependency_command: Vec<String>,
    timeout: Duration,
}

impl CodeRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            work_dir: PathBuf::from(&config.files_dir),
            python_command: split_command(&config.python_command),
            dependency_command: split_command(&config.dependency_command),
            timeout: Duration::from_secs(config.code_timeout_secs),
        }
    }

    /// 运行代码
    ///
    /// 代码写入 `<工作目录>/runner.py` 后在工作目录中执行，超时即终止。
    pub async fn run(&self, code: &str) -> Result<CodeOutput> {
        fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("无法创建目录: {}", self.work_dir.display()))?;
        let script = self.work_dir.join(RUNNER_FILE);
        fs::write(&script, code)
            .await
            .with_context(|| format!("无法写入脚本: {}", script.display()))?;

        debug!("运行代码 ({} 字符)", code.len());
        let output = self.execute(&self.python_command, &[RUNNER_FILE.to_string()]).await?;
        info!("🐍 代码执行结束，返回码: {:?}", output.return_code);
        Ok(output)
    }

    /// 安装依赖
    pub async fn add_dependencies(&self, dependencies: &[String]) -> Result<String> {
        if dependencies.is_empty() {
            bail!("没有需要安装的依赖");
        }
        fs::create_dir_all(&self.work_dir).await?;

        let output = self.execute(&self.dependency_command, dependencies).await?;
        if output.return_code != Some(0) {
            bail!(
                "依赖安装失败 (返回码 {:?}): {}",
                output.return_code,
                output.stderr
            );
        }
        info!("📦 已安装依赖: {}", dependencies.join(", "));
        Ok(format!("Installed {}", dependencies.join(", ")))
    }

    async fn execute(&self, command: &[String], extra_args: &[String]) -> Result<CodeOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("命令为空"))?;

        let child = Command::new(program)
            .args(args)
            .args(extra_args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("无法启动命令: {}", program))?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("命令执行超时 ({} 秒)", self.timeout.as_secs()))?
            .with_context(|| format!("命令执行失败: {}", program))?;

        Ok(CodeOutput {
            stdout: truncate_text(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_CHARS),
            stderr: truncate_text(&String::from_utf8_lossy(&output.stderr), MAX_OUTPUT_CHARS),
            return_code: output.status.code(),
        })
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

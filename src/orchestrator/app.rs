//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源的创建与整条链的运行。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写运行日志头、获取浏览器、创建各项能力
//! 2. **组装流水线**：任务准备 + 解题循环 + 运行日志
//! 3. **资源管理**：持有 Browser（经由 PageRenderer），确保生命周期覆盖整条链
//! 4. **全局统计**：汇总整条链的处理结果

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::PageRenderer;
use crate::services::{Downloader, LlmService, LocalToolbox, SolverClient, TaskLogWriter};
use crate::tools::ToolRegistry;
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::{AgentLoop, Identity};

use super::pipeline::{ChainReport, Pipeline};
use super::task_preparer::QuizTaskPreparer;

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: Pipeline,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config.start_url, &config.llm_model_name);

        // 获取浏览器
        let browser = browser::obtain_browser(
            config.browser_debug_port,
            config.browser_executable.as_deref(),
        )
        .await?;

        // 渲染器与下载器由任务准备和工具集共享
        let renderer = Arc::new(PageRenderer::new(browser, &config));
        let downloader = Arc::new(Downloader::new(&config.files_dir)?);

        let toolbox = Arc::new(LocalToolbox::new(
            &config,
            renderer.clone(),
            downloader.clone(),
        )?);
        let preparer = Arc::new(QuizTaskPreparer::new(
            renderer,
            LlmService::new(&config),
            downloader,
        ));
        let model = Arc::new(SolverClient::new(&config));
        let registry = ToolRegistry::new().map_err(anyhow::Error::msg)?;
        info!("🧰 已注册 {} 个工具", registry.tool_names().len());
        debug!("工具目录:\n{}", registry.to_schema_json());

        let agent = AgentLoop::new(model, toolbox, registry, config.agent());
        let identity = Identity {
            email: config.email.clone(),
            secret: config.secret.clone(),
        };
        let pipeline = Pipeline::new(preparer, agent, identity)
            .with_log_writer(TaskLogWriter::with_path(&config.output_log_file));

        Ok(Self { config, pipeline })
    }

    /// 运行整条链
    pub async fn run(&self) -> Result<ChainReport> {
        let report = self.pipeline.run(&self.config.start_url).await;

        for task in &report.tasks {
            info!(
                "[任务 #{}] {} | {} | 轮数 {} | 提交 {}",
                task.task_index, task.url, task.status, task.iterations, task.attempts
            );
        }

        print_final_stats(report.solved(), report.total(), &self.config.output_log_file);

        Ok(report)
    }
}

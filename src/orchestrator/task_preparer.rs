//! 任务准备 - 编排层
//!
//! 渲染题目页面 → 提取任务描述 → 下载任务文件

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::infrastructure::PageRenderer;
use crate::models::PreparedTask;
use crate::services::{Downloader, LlmService};
use crate::workflow::TaskCtx;

/// 把一个题目地址变成可以交给解题循环的任务
#[async_trait]
pub trait TaskPreparer: Send + Sync {
    async fn prepare(&self, ctx: &TaskCtx) -> Result<PreparedTask>;
}

/// 基于浏览器渲染与 LLM 提取的任务准备
pub struct QuizTaskPreparer {
    renderer: Arc<PageRenderer>,
    extractor: LlmService,
    downloader: Arc<Downloader>,
}

impl QuizTaskPreparer {
    pub fn new(
        renderer: Arc<PageRenderer>,
        extractor: LlmService,
        downloader: Arc<Downloader>,
    ) -> Self {
        Self {
            renderer,
            extractor,
            downloader,
        }
    }
}

#[async_trait]
impl TaskPreparer for QuizTaskPreparer {
    async fn prepare(&self, ctx: &TaskCtx) -> Result<PreparedTask> {
        let page = self
            .renderer
            .render(&ctx.url)
            .await
            .with_context(|| format!("无法渲染题目页面: {}", ctx.url))?;
        info!("{} ✓ 页面渲染完成 ({} 字符)", ctx, page.text.len());

        let descriptor = self
            .extractor
            .extract_task(&page)
            .await
            .context("无法提取任务描述")?;
        info!("{} 📝 任务: {}", ctx, crate::utils::truncate_text(&descriptor.task, 200));

        // 下载失败时保留原始地址，交给模型自行处理
        let mut local_files = Vec::with_capacity(descriptor.files.len());
        for (filename, url) in &descriptor.files {
            match self.downloader.download(url, filename).await {
                Ok(path) => local_files.push(path),
                Err(e) => {
                    warn!("{} ⚠️ 文件下载失败 {}: {:#}", ctx, url, e);
                    local_files.push(url.clone());
                }
            }
        }

        Ok(PreparedTask {
            url: ctx.url.clone(),
            descriptor,
            local_files,
        })
    }
}

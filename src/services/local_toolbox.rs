//! 本地工具集 - 业务能力层
//!
//! 把各项能力（渲染、下载、执行代码、媒体、提交）组装成 [`Toolbox`] 实现

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::infrastructure::PageRenderer;
use crate::models::{CodeOutput, RenderedPage, SubmissionOutcome};
use crate::services::{CodeRunner, Downloader, MediaService, Submitter};
use crate::tools::Toolbox;

/// 本地工具集
pub struct LocalToolbox {
    renderer: Arc<PageRenderer>,
    downloader: Arc<Downloader>,
    runner: CodeRunner,
    media: MediaService,
    submitter: Submitter,
}

impl LocalToolbox {
    /// 创建本地工具集
    ///
    /// 渲染器和下载器与任务准备阶段共享。
    pub fn new(
        config: &Config,
        renderer: Arc<PageRenderer>,
        downloader: Arc<Downloader>,
    ) -> Result<Self> {
        Ok(Self {
            renderer,
            downloader,
            runner: CodeRunner::new(config),
            media: MediaService::new(config)?,
            submitter: Submitter::new(config)?,
        })
    }
}

#[async_trait]
impl Toolbox for LocalToolbox {
    async fn render_page(&self, url: &str) -> Result<RenderedPage> {
        self.renderer.render(url).await
    }

    async fn run_code(&self, code: &str) -> Result<CodeOutput> {
        self.runner.run(code).await
    }

    async fn download_file(&self, url: &str, filename: &str) -> Result<String> {
        self.downloader.download(url, filename).await
    }

    async fn add_dependencies(&self, dependencies: &[String]) -> Result<String> {
        self.runner.add_dependencies(dependencies).await
    }

    async fn transcribe_audio(&self, file_path: &str) -> Result<String> {
        self.media.transcribe(file_path).await
    }

    async fn ocr_image(&self, image: &str, lang: &str) -> Result<String> {
        self.media.ocr(image, lang).await
    }

    async fn encode_image(&self, image_path: &str) -> Result<String> {
        self.media.encode_image(image_path).await
    }

    async fn submit_answer(
        &self,
        submission_url: &str,
        payload: JsonValue,
    ) -> Result<SubmissionOutcome> {
        Ok(self.submitter.submit(submission_url, payload).await?)
    }
}

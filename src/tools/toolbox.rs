//! 工具处理函数接口
//!
//! 每个 [`ToolName`](crate::tools::ToolName) 对应一个带类型参数的方法；
//! 具体实现见 `services::LocalToolbox`，测试中可替换为脚本化实现。

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::models::{CodeOutput, RenderedPage, SubmissionOutcome};

#[async_trait]
pub trait Toolbox: Send + Sync {
    /// `get_rendered_html`
    async fn render_page(&self, url: &str) -> anyhow::Result<RenderedPage>;

    /// `run_code`
    async fn run_code(&self, code: &str) -> anyhow::Result<CodeOutput>;

    /// `download_file`，返回本地引用
    async fn download_file(&self, url: &str, filename: &str) -> anyhow::Result<String>;

    /// `add_dependencies`
    async fn add_dependencies(&self, dependencies: &[String]) -> anyhow::Result<String>;

    /// `transcribe_audio`
    async fn transcribe_audio(&self, file_path: &str) -> anyhow::Result<String>;

    /// `ocr_image_tool`
    async fn ocr_image(&self, image: &str, lang: &str) -> anyhow::Result<String>;

    /// `encode_image_to_base64`
    async fn encode_image(&self, image_path: &str) -> anyhow::Result<String>;

    /// `submit_answer`，payload 已解析为 JSON
    async fn submit_answer(
        &self,
        submission_url: &str,
        payload: JsonValue,
    ) -> anyhow::Result<SubmissionOutcome>;
}

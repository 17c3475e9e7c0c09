//! 页面渲染器 - 基础设施层
//!
//! 持有唯一的 Browser 资源，只暴露"渲染一个 URL"的能力

use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BrowserError;
use crate::infrastructure::html;
use crate::models::RenderedPage;

/// 页面渲染器
///
/// 职责：
/// - 持有唯一的 Browser 资源
/// - 每次渲染打开一个新标签页，读完即关闭
/// - 不认识任务 / 提交
pub struct PageRenderer {
    browser: Browser,
    settle: Duration,
    max_chars: usize,
}

impl PageRenderer {
    /// 创建新的页面渲染器
    pub fn new(browser: Browser, config: &Config) -> Self {
        Self {
            browser,
            settle: Duration::from_millis(config.page_settle_ms),
            max_chars: config.max_page_chars,
        }
    }

    /// 渲染页面并提取文本与链接
    pub async fn render(&self, url: &str) -> Result<RenderedPage> {
        info!("🌐 渲染页面: {}", url);

        let page = self.browser.new_page(url).await.map_err(|source| {
            BrowserError::NavigationFailed {
                url: url.to_string(),
                source,
            }
        })?;

        let result = self.read_page(&page, url).await;

        if let Err(e) = page.close().await {
            warn!("关闭标签页失败: {}", e);
        }

        result
    }

    async fn read_page(&self, page: &Page, url: &str) -> Result<RenderedPage> {
        page.wait_for_navigation()
            .await
            .map_err(|source| BrowserError::NavigationFailed {
                url: url.to_string(),
                source,
            })?;

        // 等待页面脚本完成渲染
        sleep(self.settle).await;

        let raw_html = page.content().await.map_err(BrowserError::ContentFailed)?;
        let base_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        debug!("页面 HTML 长度: {} 字符", raw_html.len());

        // 先提取链接，再清洗文本
        let files = html::extract_all_urls(&raw_html, &base_url)?;
        let text = html::truncate_page_text(html::clean_text(&raw_html, &base_url)?, self.max_chars);

        debug!("提取文本 {} 字符，链接 {} 个", text.len(), files.len());

        Ok(RenderedPage {
            url: url.to_string(),
            text,
            files,
        })
    }
}

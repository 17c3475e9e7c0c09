use chromiumoxide::Browser;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use super::spawn_event_loop;
use crate::error::BrowserError;

/// 连接到已开启远程调试端口的浏览器
pub async fn connect_to_browser(port: u16) -> Result<Browser, BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed { port, source: e }
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    spawn_event_loop(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(browser)
}

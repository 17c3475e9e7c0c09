use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use super::spawn_event_loop;
use crate::error::BrowserError;

/// 启动无头浏览器
///
/// # 参数
/// - `executable`: 浏览器可执行文件路径，未指定时由 chromiumoxide 自动查找
pub async fn launch_headless_browser(executable: Option<&str>) -> Result<Browser, BrowserError> {
    info!("🚀 启动无头浏览器...");
    debug!("浏览器可执行文件: {:?}", executable);

    // 配置无头浏览器
    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",             // 无头模式禁用 GPU
        "--no-sandbox",              // 容器内运行时没有沙盒权限
        "--disable-dev-shm-usage",   // 防止共享内存不足
        "--remote-debugging-port=0", // 让浏览器自动选择端口
    ]);
    if let Some(path) = executable {
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        BrowserError::LaunchFailed(e)
    })?;

    // 启动浏览器
    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::LaunchFailed(e.to_string())
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    spawn_event_loop(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    info!("✅ 无头浏览器已就绪");
    Ok(browser)
}

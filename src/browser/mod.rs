//! 浏览器资源的获取：启动无头浏览器，或连接到已开启调试端口的浏览器

pub mod connection;
pub mod headless;

pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;

use std::fmt;

use chromiumoxide::Browser;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BrowserError;

/// 配置了调试端口时连接现有浏览器，否则启动无头浏览器
pub async fn obtain_browser(
    debug_port: Option<u16>,
    executable: Option<&str>,
) -> Result<Browser, BrowserError> {
    match debug_port {
        Some(port) => connect_to_browser(port).await,
        None => launch_headless_browser(executable).await,
    }
}

/// 在后台驱动浏览器事件流，直到连接关闭
///
/// 单个事件出错只记录日志，不结束循环；返回处理过的事件数。
pub(crate) fn spawn_event_loop<S, E>(mut events: S) -> JoinHandle<usize>
where
    S: Stream<Item = Result<(), E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        let mut handled = 0;
        while let Some(event) = events.next().await {
            handled += 1;
            if let Err(e) = event {
                warn!("浏览器事件处理出错: {}", e);
            }
        }
        debug!("浏览器事件流已结束");
        handled
    })
}

use anyhow::Result;
use quiz_chain_solver::utils::logging;
use quiz_chain_solver::{App, AppError, Config};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置，命令行第一个参数覆盖 START_URL
    let mut config = Config::from_env();
    if let Some(url) = std::env::args().nth(1) {
        config.start_url = url;
    }
    if let Err(e) = config.validate().map_err(AppError::from) {
        error!("❌ {}", e);
        return Err(e.into());
    }

    // 初始化并运行应用
    let _report = App::initialize(config).await?.run().await?;

    Ok(())
}

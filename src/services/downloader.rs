//! 文件下载服务 - 业务能力层
//!
//! 只负责"把一个 URL 下载到工作目录"能力

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// 下载超时
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// 文件下载服务
pub struct Downloader {
    http: reqwest::Client,
    files_dir: PathBuf,
}

impl Downloader {
    pub fn new(files_dir: impl Into<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("无法创建下载客户端")?;

        Ok(Self {
            http,
            files_dir: files_dir.into(),
        })
    }

    /// 下载文件
    ///
    /// # 参数
    /// - `url`: 文件地址
    /// - `filename`: 保存的文件名，路径部分会被去掉
    ///
    /// # 返回
    /// 返回保存后的本地路径
    pub async fn download(&self, url: &str, filename: &str) -> Result<String> {
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(&self.files_dir)
            .await
            .with_context(|| format!("无法创建目录: {}", self.files_dir.display()))?;
        let target = self.files_dir.join(&name);

        debug!("下载 {} -> {}", url, target.display());

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("下载请求失败: {}", url))?
            .error_for_status()
            .with_context(|| format!("下载失败: {}", url))?;

        let mut file = fs::File::create(&target)
            .await
            .with_context(|| format!("无法创建文件: {}", target.display()))?;

        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("读取响应失败: {}", url))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!("📥 已下载 {} ({} 字节)", target.display(), written);
        Ok(target.to_string_lossy().into_owned())
    }
}

/// 去掉文件名中的目录部分，避免写到工作目录之外
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        bail!("文件名不合法: {:?}", filename);
    }
    Ok(name.to_string())
}

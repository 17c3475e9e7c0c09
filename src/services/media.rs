//! 媒体服务 - 业务能力层
//!
//! 音频转写、图片 OCR 与 base64 编码

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;

/// 转写请求超时
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// 媒体服务
pub struct MediaService {
    http: reqwest::Client,
    api_key: String,
    transcription_endpoint: String,
    transcription_model: String,
    ocr_command: String,
    files_dir: PathBuf,
}

impl MediaService {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TRANSCRIBE_TIMEOUT)
            .build()
            .context("无法创建转写客户端")?;

        Ok(Self {
            http,
            api_key: config.llm_api_key.clone(),
            transcription_endpoint: format!(
                "{}/audio/transcriptions",
                config.llm_api_base_url.trim_end_matches('/')
            ),
            transcription_model: config.transcription_model.clone(),
            ocr_command: config.ocr_command.clone(),
            files_dir: PathBuf::from(&config.files_dir),
        })
    }

    /// 相对路径先在工作目录下查找
    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() || candidate.exists() {
            return candidate.to_path_buf();
        }
        self.files_dir.join(candidate)
    }

    /// 音频转写
    pub async fn transcribe(&self, file_path: &str) -> Result<String> {
        let path = self.resolve(file_path);
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("无法读取音频文件: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        debug!("转写音频 {} ({} 字节)", path.display(), bytes.len());

        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(&self.transcription_endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("转写请求失败")?;

        let status = response.status();
        let body = response.text().await.context("读取转写响应失败")?;
        if !status.is_success() {
            bail!("转写失败 (HTTP {}): {}", status.as_u16(), body);
        }

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).with_context(|| format!("转写响应无法解析: {}", body))?;
        info!("🎧 音频转写完成 ({} 字符)", parsed.text.len());
        Ok(parsed.text)
    }

    /// 图片 OCR
    ///
    /// `image` 可以是文件路径，也可以是 base64 编码的图片（可带 data URL 前缀）。
    pub async fn ocr(&self, image: &str, lang: &str) -> Result<String> {
        let path = self.resolve(image);
        let (image_path, temporary) = if path.exists() {
            (path, false)
        } else {
            let bytes = decode_base64_image(image)?;
            fs::create_dir_all(&self.files_dir).await?;
            let tmp = self.files_dir.join(format!("ocr_input_{}.png", std::process::id()));
            fs::write(&tmp, bytes)
                .await
                .with_context(|| format!("无法写入临时图片: {}", tmp.display()))?;
            (tmp, true)
        };

        let result = self.run_ocr(&image_path, lang).await;
        if temporary {
            let _ = fs::remove_file(&image_path).await;
        }
        result
    }

    async fn run_ocr(&self, image_path: &Path, lang: &str) -> Result<String> {
        let output = Command::new(&self.ocr_command)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("无法启动 OCR 命令: {}", self.ocr_command))?;

        if !output.status.success() {
            bail!(
                "OCR 失败 (返回码 {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("🖼️ OCR 完成 ({} 字符)", text.len());
        Ok(text)
    }

    /// 把图片文件编码为 base64
    pub async fn encode_image(&self, image_path: &str) -> Result<String> {
        let path = self.resolve(image_path);
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("无法读取图片: {}", path.display()))?;
        Ok(STANDARD.encode(bytes))
    }
}

/// 解码 base64 图片，容忍 `data:image/png;base64,` 前缀
pub fn decode_base64_image(data: &str) -> Result<Vec<u8>> {
    let encoded = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow!("既不是存在的文件，也不是合法的 base64 图片: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(files_dir: &Path) -> MediaService {
        let config = Config {
            files_dir: files_dir.to_string_lossy().into_owned(),
            llm_api_base_url: "https://llm.example/v1/".to_string(),
            ..Default::default()
        };
        MediaService::new(&config).unwrap()
    }

    #[test]
    fn test_decode_base64_with_data_url_prefix() {
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(b"png-bytes"));
        assert_eq!(decode_base64_image(&encoded).unwrap(), b"png-bytes");
        assert_eq!(decode_base64_image(&STANDARD.encode(b"raw")).unwrap(), b"raw");
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        assert!(decode_base64_image("not a file, not base64!").is_err());
    }

    #[test]
    fn test_transcription_endpoint() {
        let media = service(&std::env::temp_dir());
        assert_eq!(
            media.transcription_endpoint,
            "https://llm.example/v1/audio/transcriptions"
        );
    }

    #[tokio::test]
    async fn test_encode_image_reads_from_files_dir() {
        let dir = std::env::temp_dir().join(format!("media_test_{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("pixel.png"), b"\x89PNG").await.unwrap();

        let media = service(&dir);
        let encoded = media.encode_image("pixel.png").await.unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"\x89PNG");

        assert!(media.encode_image("missing.png").await.is_err());
    }
}

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 第一道题目的URL
    pub start_url: String,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 解题模型
    pub llm_model_name: String,
    /// 任务提取模型
    pub extractor_model_name: String,
    /// 单次请求超时（秒）
    pub llm_request_timeout_secs: u64,
    /// 模型客户端的最大尝试次数
    pub llm_max_attempts: u32,
    /// 被限流（429）后的等待时间（秒）
    pub rate_limit_backoff_secs: u64,
    // --- 提交身份 ---
    pub email: String,
    pub secret: String,
    /// 页面未给出提交地址时使用的默认地址
    pub default_submission_url: Option<String>,
    // --- 解题循环 ---
    pub max_iterations: u32,
    pub retry_limit: u32,
    pub task_timeout_secs: u64,
    pub pacing_delay_ms: u64,
    // --- 工具 ---
    /// 下载文件与运行代码的工作目录
    pub files_dir: String,
    pub python_command: String,
    pub dependency_command: String,
    pub code_timeout_secs: u64,
    pub ocr_command: String,
    pub transcription_model: String,
    // --- 浏览器 ---
    /// 设置后连接已有浏览器的调试端口，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    pub browser_executable: Option<String>,
    /// 页面导航完成后额外等待脚本渲染的时间（毫秒）
    pub page_settle_ms: u64,
    pub max_page_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://aipipe.org/openrouter/v1".to_string(),
            llm_model_name: "openai/gpt-5.1-codex-max".to_string(),
            extractor_model_name: "openai/gpt-5.1-codex-max".to_string(),
            llm_request_timeout_secs: 60,
            llm_max_attempts: 5,
            rate_limit_backoff_secs: 20,
            email: String::new(),
            secret: String::new(),
            default_submission_url: None,
            max_iterations: 20,
            retry_limit: 2,
            task_timeout_secs: 180,
            pacing_delay_ms: 5000,
            files_dir: "LLMFiles".to_string(),
            python_command: "uv run python".to_string(),
            dependency_command: "uv add".to_string(),
            code_timeout_secs: 120,
            ocr_command: "tesseract".to_string(),
            transcription_model: "whisper-1".to_string(),
            browser_debug_port: None,
            browser_executable: None,
            page_settle_ms: 1000,
            max_page_chars: 300_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let extractor_model_name = std::env::var("EXTRACTOR_MODEL_NAME").ok();
        let llm_model_name = std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name);
        Self {
            start_url: std::env::var("START_URL").unwrap_or(default.start_url),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            extractor_model_name: extractor_model_name.unwrap_or_else(|| llm_model_name.clone()),
            llm_model_name,
            llm_request_timeout_secs: parse_env("LLM_REQUEST_TIMEOUT_SECS").unwrap_or(default.llm_request_timeout_secs),
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS").unwrap_or(default.llm_max_attempts),
            rate_limit_backoff_secs: parse_env("RATE_LIMIT_BACKOFF_SECS").unwrap_or(default.rate_limit_backoff_secs),
            email: std::env::var("EMAIL").unwrap_or(default.email),
            secret: std::env::var("SECRET").unwrap_or(default.secret),
            default_submission_url: std::env::var("DEFAULT_SUBMISSION_URL").ok().filter(|v| !v.is_empty()),
            max_iterations: parse_env("MAX_ITERATIONS").unwrap_or(default.max_iterations),
            retry_limit: parse_env("RETRY_LIMIT").unwrap_or(default.retry_limit),
            task_timeout_secs: parse_env("TASK_TIMEOUT_SECS").unwrap_or(default.task_timeout_secs),
            pacing_delay_ms: parse_env("PACING_DELAY_MS").unwrap_or(default.pacing_delay_ms),
            files_dir: std::env::var("FILES_DIR").unwrap_or(default.files_dir),
            python_command: std::env::var("PYTHON_COMMAND").unwrap_or(default.python_command),
            dependency_command: std::env::var("DEPENDENCY_COMMAND").unwrap_or(default.dependency_command),
            code_timeout_secs: parse_env("CODE_TIMEOUT_SECS").unwrap_or(default.code_timeout_secs),
            ocr_command: std::env::var("OCR_COMMAND").unwrap_or(default.ocr_command),
            transcription_model: std::env::var("TRANSCRIPTION_MODEL").unwrap_or(default.transcription_model),
            browser_debug_port: parse_env("BROWSER_DEBUG_PORT").or(default.browser_debug_port),
            browser_executable: std::env::var("BROWSER_EXECUTABLE").ok().filter(|v| !v.is_empty()),
            page_settle_ms: parse_env("PAGE_SETTLE_MS").unwrap_or(default.page_settle_ms),
            max_page_chars: parse_env("MAX_PAGE_CHARS").unwrap_or(default.max_page_chars),
        }
    }

    /// 检查运行所必需的配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("START_URL", &self.start_url),
            ("LLM_API_KEY", &self.llm_api_key),
            ("EMAIL", &self.email),
            ("SECRET", &self.secret),
        ];
        for (var_name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EnvVarNotFound {
                    var_name: var_name.to_string(),
                });
            }
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                var_name: "MAX_ITERATIONS".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 解题循环的参数
    pub fn agent(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            retry_limit: self.retry_limit,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
        }
    }
}

/// 解题循环配置
///
/// 由 [`Config::agent`] 生成，构造时传入 `AgentLoop` 与 `Pipeline`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// 每道题最多向模型请求的轮数
    pub max_iterations: u32,
    /// 提交次数超过该值且服务端给出下一题时直接前进
    pub retry_limit: u32,
    /// 从开始处理一道题起算的超时时间
    pub task_timeout: Duration,
    /// 两轮之间的固定间隔
    pub pacing_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Config::default().agent()
    }
}

fn parse_env<T: FromStr>(var_name: &str) -> Option<T> {
    parse_value(var_name, std::env::var(var_name).ok())
}

/// 值无法解析时记录警告，由调用方回退到默认值
fn parse_value<T: FromStr>(var_name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("环境变量 {} 的值无法解析: {:?}，使用默认值", var_name, raw);
            None
        }
    }
}

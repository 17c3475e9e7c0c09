use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 工具调用错误
    #[error("工具错误: {0}")]
    Tool(#[from] ToolError),
    /// 答案提交错误
    #[error("提交错误: {0}")]
    Submission(#[from] SubmissionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {0}")]
    LaunchFailed(String),
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 读取页面内容失败
    #[error("读取页面内容失败: {0}")]
    ContentFailed(#[from] chromiumoxide::error::CdpError),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 多次尝试后仍未得到合法回复
    #[error("LLM 重试 {attempts} 次后仍失败 (模型: {model}): {last_error}")]
    RetriesExhausted {
        model: String,
        attempts: u32,
        last_error: String,
    },
    /// 无法把回复解析为任务描述
    #[error("无法解析任务描述 (响应: {response}): {source}")]
    TaskParseFailed {
        response: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 工具调用错误，作为工具结果回传给模型，不会中断循环
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// 模型请求了未注册的工具
    #[error("Unknown tool '{name}'")]
    UnknownTool { name: String },
    /// 参数不符合工具的参数约定
    #[error("Invalid arguments for tool '{tool}': {reason} (args: {arguments})")]
    InvalidArguments {
        tool: String,
        arguments: String,
        reason: String,
    },
    /// 工具执行失败
    #[error("Error {message} occurred while calling {tool} with args {arguments}")]
    Execution {
        tool: String,
        arguments: String,
        message: String,
    },
}

/// 答案提交错误
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// payload 不是合法的 JSON 对象
    #[error("payload 不是合法的 JSON 对象: {0}")]
    InvalidPayload(String),
    /// 网络请求失败
    #[error("提交请求失败 ({url}): {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 响应不是 JSON
    #[error("提交响应无法解析 (HTTP {status}): {body}")]
    BadResponse { status: u16, body: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 环境变量取值不合法
    #[error("环境变量 {var_name} 取值不合法: {reason}")]
    InvalidValue { var_name: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl ToolError {
    /// 出错的工具名（未知工具时为模型给出的名字）
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::UnknownTool { name } => name,
            ToolError::InvalidArguments { tool, .. } | ToolError::Execution { tool, .. } => tool,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_mentions_tool_and_args() {
        let err = ToolError::Execution {
            tool: "run_code".to_string(),
            arguments: r#"{"code":"1/0"}"#.to_string(),
            message: "ZeroDivisionError".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("run_code"));
        assert!(text.contains("ZeroDivisionError"));
        assert!(text.contains(r#"{"code":"1/0"}"#));
        assert_eq!(err.tool_name(), "run_code");
    }

    #[test]
    fn test_config_error_wraps_into_app_error() {
        let err: AppError = ConfigError::EnvVarNotFound {
            var_name: "EMAIL".to_string(),
        }
        .into();
        assert!(err.to_string().contains("EMAIL"));
    }
}

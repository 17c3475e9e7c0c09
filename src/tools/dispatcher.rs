//! 工具分发
//!
//! 模型给出的调用先被解析为带类型的 [`ToolInvocation`]：未知工具名和不合法参数在这里变成
//! [`ToolError`]。提交答案单独成为 [`ToolInvocation::Submit`]，由解题循环交给提交评估器处理；
//! 其余调用经 [`ToolDispatcher::execute`] 执行，失败一律转成 `Err(ToolError)`，不会向上抛出。

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::error::{SubmissionError, ToolError};
use crate::models::ToolCall;
use crate::tools::registry::ToolName;
use crate::tools::toolbox::Toolbox;
use crate::utils::logging::truncate_text;

/// 工具调用结果
pub type ToolResult = Result<String, ToolError>;

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// `submit_answer` 的参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitArgs {
    pub submission_url: String,
    /// 约定为 JSON 字符串，也接受直接给出的对象
    pub payload: JsonValue,
}

impl SubmitArgs {
    /// 取出 payload 对象
    pub fn payload_value(&self) -> Result<JsonValue, SubmissionError> {
        let value = match &self.payload {
            JsonValue::String(raw) => serde_json::from_str(raw)
                .map_err(|e| SubmissionError::InvalidPayload(format!("{}: {}", e, raw)))?,
            other => other.clone(),
        };
        if value.is_object() {
            Ok(value)
        } else {
            Err(SubmissionError::InvalidPayload(value.to_string()))
        }
    }
}

/// 除提交以外的工具动作
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    GetRenderedHtml { url: String },
    RunCode { code: String },
    DownloadFile { url: String, filename: String },
    AddDependencies { dependencies: Vec<String> },
    TranscribeAudio { file_path: String },
    OcrImage { image: String, lang: Option<String> },
    EncodeImageToBase64 { image_path: String },
}

impl ToolAction {
    pub fn tool(&self) -> ToolName {
        match self {
            ToolAction::GetRenderedHtml { .. } => ToolName::GetRenderedHtml,
            ToolAction::RunCode { .. } => ToolName::RunCode,
            ToolAction::DownloadFile { .. } => ToolName::DownloadFile,
            ToolAction::AddDependencies { .. } => ToolName::AddDependencies,
            ToolAction::TranscribeAudio { .. } => ToolName::TranscribeAudio,
            ToolAction::OcrImage { .. } => ToolName::OcrImage,
            ToolAction::EncodeImageToBase64 { .. } => ToolName::EncodeImageToBase64,
        }
    }
}

/// 解析后的工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Submit(SubmitArgs),
    Action(ToolAction),
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

#[derive(Deserialize)]
struct RunCodeArgs {
    code: String,
}

#[derive(Deserialize)]
struct DownloadArgs {
    url: String,
    filename: String,
}

#[derive(Deserialize)]
struct DependencyArgs {
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct AudioArgs {
    file_path: String,
}

#[derive(Deserialize)]
struct OcrArgs {
    payload: OcrPayload,
}

#[derive(Deserialize)]
struct OcrPayload {
    image: String,
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Deserialize)]
struct ImageArgs {
    image_path: String,
}

impl ToolInvocation {
    /// 校验工具名与参数
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        let tool: ToolName = call.name().parse()?;
        let args = call
            .parsed_arguments()
            .map_err(|e| invalid_arguments(tool, call, e))?;

        let invocation = match tool {
            ToolName::SubmitAnswer => ToolInvocation::Submit(decode(tool, call, args)?),
            ToolName::GetRenderedHtml => {
                let UrlArgs { url } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::GetRenderedHtml { url })
            }
            ToolName::RunCode => {
                let RunCodeArgs { code } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::RunCode { code })
            }
            ToolName::DownloadFile => {
                let DownloadArgs { url, filename } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::DownloadFile { url, filename })
            }
            ToolName::AddDependencies => {
                let DependencyArgs { dependencies } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::AddDependencies { dependencies })
            }
            ToolName::TranscribeAudio => {
                let AudioArgs { file_path } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::TranscribeAudio { file_path })
            }
            ToolName::OcrImage => {
                let OcrArgs { payload } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::OcrImage {
                    image: payload.image,
                    lang: payload.lang,
                })
            }
            ToolName::EncodeImageToBase64 => {
                let ImageArgs { image_path } = decode(tool, call, args)?;
                ToolInvocation::Action(ToolAction::EncodeImageToBase64 { image_path })
            }
        };
        Ok(invocation)
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, call: &ToolCall, args: JsonValue) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| invalid_arguments(tool, call, e))
}

fn invalid_arguments(tool: ToolName, call: &ToolCall, reason: impl std::fmt::Display) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.as_str().to_string(),
        arguments: call.arguments().to_string(),
        reason: reason.to_string(),
    }
}

/// 工具分发器：按动作调用对应的处理函数，并把任何失败转为 [`ToolError::Execution`]
#[derive(Clone)]
pub struct ToolDispatcher {
    toolbox: Arc<dyn Toolbox>,
}

impl ToolDispatcher {
    pub fn new(toolbox: Arc<dyn Toolbox>) -> Self {
        Self { toolbox }
    }

    pub fn toolbox(&self) -> &Arc<dyn Toolbox> {
        &self.toolbox
    }

    /// 执行工具动作；`raw_arguments` 仅用于错误信息与审计日志
    pub async fn execute(&self, action: &ToolAction, raw_arguments: &str) -> ToolResult {
        let start = Instant::now();
        let tool = action.tool();

        let result = self.run(action).await.map_err(|e| ToolError::Execution {
            tool: tool.as_str().to_string(),
            arguments: raw_arguments.to_string(),
            message: format!("{:#}", e),
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            tool = tool.as_str(),
            ok = result.is_ok(),
            duration_ms,
            args_preview = %truncate_text(raw_arguments, ARGS_PREVIEW_CHARS),
            "🔧 工具调用"
        );

        result
    }

    async fn run(&self, action: &ToolAction) -> anyhow::Result<String> {
        let output = match action {
            ToolAction::GetRenderedHtml { url } => {
                serde_json::to_string(&self.toolbox.render_page(url).await?)?
            }
            ToolAction::RunCode { code } => serde_json::to_string(&self.toolbox.run_code(code).await?)?,
            ToolAction::DownloadFile { url, filename } => {
                self.toolbox.download_file(url, filename).await?
            }
            ToolAction::AddDependencies { dependencies } => {
                self.toolbox.add_dependencies(dependencies).await?
            }
            ToolAction::TranscribeAudio { file_path } => self.toolbox.transcribe_audio(file_path).await?,
            ToolAction::OcrImage { image, lang } => {
                self.toolbox
                    .ocr_image(image, lang.as_deref().unwrap_or("eng"))
                    .await?
            }
            ToolAction::EncodeImageToBase64 { image_path } => self.toolbox.encode_image(image_path).await?,
        };
        Ok(output)
    }
}

/// 工具结果消息的文本
pub fn format_tool_result(result: &ToolResult) -> String {
    match result {
        Ok(output) => format!("Tool call resulted in: {}", output),
        Err(e) => format!("Tool call resulted in: {}", json!({ "error": e.to_string() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_action() {
        let call = ToolCall::new(
            "call_1",
            "download_file",
            r#"{"url": "https://quiz.example/a.csv", "filename": "a.csv"}"#,
        );
        assert_eq!(
            ToolInvocation::parse(&call).unwrap(),
            ToolInvocation::Action(ToolAction::DownloadFile {
                url: "https://quiz.example/a.csv".to_string(),
                filename: "a.csv".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_unknown_tool() {
        let call = ToolCall::new("call_1", "rm_rf", "{}");
        assert!(matches!(
            ToolInvocation::parse(&call),
            Err(ToolError::UnknownTool { .. })
        ));
    }

    #[test]
    fn test_parse_malformed_json_arguments() {
        let call = ToolCall::new("call_1", "run_code", r#"{"code": "print(1)""#);
        match ToolInvocation::parse(&call) {
            Err(ToolError::InvalidArguments { tool, arguments, .. }) => {
                assert_eq!(tool, "run_code");
                assert_eq!(arguments, r#"{"code": "print(1)""#);
            }
            other => panic!("意外的结果: {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_required_field() {
        let call = ToolCall::new("call_1", "download_file", r#"{"url": "https://quiz.example/a.csv"}"#);
        assert!(matches!(
            ToolInvocation::parse(&call),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_parse_ocr_nested_payload() {
        let call = ToolCall::new("call_1", "ocr_image_tool", r#"{"payload": {"image": "scan.png"}}"#);
        assert_eq!(
            ToolInvocation::parse(&call).unwrap(),
            ToolInvocation::Action(ToolAction::OcrImage {
                image: "scan.png".to_string(),
                lang: None,
            })
        );
    }

    #[test]
    fn test_submit_payload_as_string_or_object() {
        let as_string = SubmitArgs {
            submission_url: "https://quiz.example/submit".to_string(),
            payload: json!(r#"{"answer": 42}"#),
        };
        assert_eq!(as_string.payload_value().unwrap(), json!({"answer": 42}));

        let as_object = SubmitArgs {
            submission_url: "https://quiz.example/submit".to_string(),
            payload: json!({"answer": "x"}),
        };
        assert_eq!(as_object.payload_value().unwrap(), json!({"answer": "x"}));

        let broken = SubmitArgs {
            submission_url: "https://quiz.example/submit".to_string(),
            payload: json!("{answer: 42"),
        };
        assert!(broken.payload_value().is_err());

        let not_object = SubmitArgs {
            submission_url: "https://quiz.example/submit".to_string(),
            payload: json!("[1, 2]"),
        };
        assert!(not_object.payload_value().is_err());
    }

    #[test]
    fn test_format_error_result() {
        let result: ToolResult = Err(ToolError::UnknownTool {
            name: "nope".to_string(),
        });
        let text = format_tool_result(&result);
        assert!(text.starts_with("Tool call resulted in: "));
        assert!(text.contains("Unknown tool 'nope'"));
    }
}

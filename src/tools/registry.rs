//! 工具注册表
//!
//! 工具集合是封闭的：每个工具对应 [`ToolName`] 的一个变体，名称、描述与参数 schema
//! 都由变体静态给出。[`ToolRegistry`] 在启动时生成并校验发给模型的工具目录，之后只读。

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::error::ToolError;

/// 可供模型调用的工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetRenderedHtml,
    RunCode,
    DownloadFile,
    AddDependencies,
    SubmitAnswer,
    TranscribeAudio,
    OcrImage,
    EncodeImageToBase64,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::GetRenderedHtml,
        ToolName::RunCode,
        ToolName::DownloadFile,
        ToolName::AddDependencies,
        ToolName::SubmitAnswer,
        ToolName::TranscribeAudio,
        ToolName::OcrImage,
        ToolName::EncodeImageToBase64,
    ];

    /// 模型看到的工具名
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetRenderedHtml => "get_rendered_html",
            ToolName::RunCode => "run_code",
            ToolName::DownloadFile => "download_file",
            ToolName::AddDependencies => "add_dependencies",
            ToolName::SubmitAnswer => "submit_answer",
            ToolName::TranscribeAudio => "transcribe_audio",
            ToolName::OcrImage => "ocr_image_tool",
            ToolName::EncodeImageToBase64 => "encode_image_to_base64",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::GetRenderedHtml => {
                "Fetch a web page, render it in a headless browser and return its readable text together with every linked file and image URL."
            }
            ToolName::RunCode => {
                "Run Python code in the working directory and return stdout, stderr and the exit code. Do NOT use this tool to submit the answer."
            }
            ToolName::DownloadFile => {
                "Download a file from a URL into the working directory under the given file name."
            }
            ToolName::AddDependencies => "Install additional Python packages with 'uv add'.",
            ToolName::SubmitAnswer => {
                "Submit the answer to the submission URL. Call this once you have found the answer; the response tells you whether it was correct."
            }
            ToolName::TranscribeAudio => {
                "Transcribe an audio file (MP3, WAV, OPUS, ...) from the working directory into text."
            }
            ToolName::OcrImage => {
                "Extract text from an image with OCR. Accepts an image path relative to the working directory or a base64 string."
            }
            ToolName::EncodeImageToBase64 => {
                "Encode an image file from the working directory as a base64 string."
            }
        }
    }

    /// 参数的 JSON Schema
    pub fn parameters_schema(&self) -> JsonValue {
        match self {
            ToolName::GetRenderedHtml => object_schema(
                json!({"url": {"type": "string", "description": "The URL to fetch and render."}}),
                &["url"],
            ),
            ToolName::RunCode => object_schema(
                json!({"code": {"type": "string", "description": "Python source code to execute."}}),
                &["code"],
            ),
            ToolName::DownloadFile => object_schema(
                json!({
                    "url": {"type": "string", "description": "Direct URL to the file."},
                    "filename": {"type": "string", "description": "File name to save the content as, without directories."}
                }),
                &["url", "filename"],
            ),
            ToolName::AddDependencies => object_schema(
                json!({
                    "dependencies": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Package names to install."
                    }
                }),
                &["dependencies"],
            ),
            ToolName::SubmitAnswer => object_schema(
                json!({
                    "submission_url": {"type": "string", "description": "The URL the answer must be posted to."},
                    "payload": {
                        "type": "string",
                        "description": "The submission body as a JSON string, e.g. '{\"url\": \"...\", \"answer\": ...}'."
                    }
                }),
                &["submission_url", "payload"],
            ),
            ToolName::TranscribeAudio => object_schema(
                json!({"file_path": {"type": "string", "description": "Audio file path relative to the working directory, e.g. 'audio.mp3'."}}),
                &["file_path"],
            ),
            ToolName::OcrImage => object_schema(
                json!({
                    "payload": object_schema(
                        json!({
                            "image": {"type": "string", "description": "Image path relative to the working directory, or a base64 string."},
                            "lang": {"type": "string", "description": "OCR language code, default 'eng'."}
                        }),
                        &["image"],
                    )
                }),
                &["payload"],
            ),
            ToolName::EncodeImageToBase64 => object_schema(
                json!({"image_path": {"type": "string", "description": "Path of the image file to encode."}}),
                &["image_path"],
            ),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool {
                name: s.to_string(),
            })
    }
}

fn object_schema(properties: JsonValue, required: &[&str]) -> JsonValue {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// 发给模型的单个工具声明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: JsonValue,
}

/// 工具注册表：持有校验过的工具目录
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    catalogue: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// 生成并校验工具目录
    ///
    /// 校验项：名称唯一、名称可反查回同一变体、`required` 中的字段都在 `properties` 中声明。
    pub fn new() -> Result<Self, String> {
        let mut seen = HashSet::new();
        let mut catalogue = Vec::with_capacity(ToolName::ALL.len());

        for tool in ToolName::ALL {
            let name = tool.as_str();
            if !seen.insert(name) {
                return Err(format!("工具名重复: {}", name));
            }
            if name.parse::<ToolName>().ok() != Some(tool) {
                return Err(format!("工具名无法反查: {}", name));
            }
            let parameters = tool.parameters_schema();
            check_schema(name, &parameters)?;
            catalogue.push(ToolSpec {
                kind: "function",
                function: FunctionSpec {
                    name,
                    description: tool.description(),
                    parameters,
                },
            });
        }

        Ok(Self { catalogue })
    }

    /// 工具目录（顺序与 [`ToolName::ALL`] 一致）
    pub fn catalogue(&self) -> &[ToolSpec] {
        &self.catalogue
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.catalogue.iter().map(|spec| spec.function.name).collect()
    }

    /// 目录的 JSON 形式，供日志与调试使用
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.catalogue).unwrap_or_else(|_| "[]".to_string())
    }
}

fn check_schema(name: &str, schema: &JsonValue) -> Result<(), String> {
    if schema.get("type").and_then(|v| v.as_str()) != Some("object") {
        return Err(format!("工具 {} 的参数 schema 必须是 object", name));
    }
    let properties = schema
        .get("properties")
        .and_then(|v| v.as_object())
        .ok_or_else(|| format!("工具 {} 缺少 properties", name))?;
    let required = schema
        .get("required")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    for field in required {
        let field = field.as_str().unwrap_or_default();
        if !properties.contains_key(field) {
            return Err(format!("工具 {} 的必填字段 {} 未声明", name, field));
        }
    }
    for (field, property) in properties {
        if property.get("type").and_then(|v| v.as_str()) == Some("object") {
            check_schema(&format!("{}.{}", name, field), property)?;
        }
    }
    Ok(())
}

//! LLM 服务 - 业务能力层
//!
//! 只负责"从题目页面提取任务"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 OpenRouter、AIPipe 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::{RenderedPage, TaskDescriptor};

/// 任务提取的最大尝试次数
const MAX_EXTRACT_ATTEMPTS: usize = 3;

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 把题目页面文本转成结构化任务
/// - 提供通用的 LLM 调用接口
/// - 只处理单个页面
/// - 不关心解题循环
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    email: String,
    secret: String,
    default_submission_url: Option<String>,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.extractor_model_name.clone(),
            email: config.email.clone(),
            secret: config.secret.clone(),
            default_submission_url: config.default_submission_url.clone(),
        }
    }

    /// 构建一次请求
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `response_format`: 要求的输出格式（可选），任务提取时为 `json_object`
    fn build_request(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        response_format: Option<ResponseFormat>,
    ) -> Result<CreateChatCompletionRequest> {
        // 构建消息列表
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name).messages(messages);
        if let Some(format) = response_format {
            args.response_format(format);
        }

        Ok(args.build()?)
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(&self, request: CreateChatCompletionRequest) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("消息数: {}", request.messages.len());

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: e.to_string(),
            }
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 从渲染后的题目页面中提取任务
    ///
    /// 解析失败时重新请求，最多尝试 3 次。
    pub async fn extract_task(&self, page: &RenderedPage) -> Result<TaskDescriptor> {
        let prompt = self.build_extract_prompt(page);
        let request = self.build_request(
            &prompt,
            Some(EXTRACTOR_SYSTEM_PROMPT),
            Some(ResponseFormat::JsonObject),
        )?;
        let mut last_error = None;

        for attempt in 1..=MAX_EXTRACT_ATTEMPTS {
            let response = self.send_to_llm(request.clone()).await?;
            match parse_task_response(&response) {
                Ok(descriptor) => return Ok(self.fill_defaults(descriptor, page)),
                Err(e) => {
                    warn!(
                        "任务描述解析失败 (尝试 {}/{}): {}",
                        attempt, MAX_EXTRACT_ATTEMPTS, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("任务描述提取失败")))
    }

    /// 补全页面未给出的字段
    fn fill_defaults(&self, mut descriptor: TaskDescriptor, page: &RenderedPage) -> TaskDescriptor {
        if descriptor.quiz_url.trim().is_empty() {
            descriptor.quiz_url = page.url.clone();
        }
        if descriptor.submission_url.trim().is_empty() {
            if let Some(default_url) = &self.default_submission_url {
                descriptor.submission_url = default_url.clone();
            }
        }
        descriptor
    }

    /// 构建任务提取的用户消息
    fn build_extract_prompt(&self, page: &RenderedPage) -> String {
        let submission_default = self
            .default_submission_url
            .as_deref()
            .unwrap_or("the submission URL stated on the page");

        format!(
            r#"Turn the quiz page below into one JSON object with exactly these keys:

{{
  "task": "string",               // what must be computed and submitted; do not ask to download the listed files, they are downloaded for the solver
  "files": {{"<filename>": "url"}}, // every file needed to solve the task; file names must not contain '/' or '\\'; {{}} if none
  "quiz_url": "string",
  "submission_url": "string",     // where the answer is POSTed; default: {submission_default}; never the quiz URL itself
  "payload": {{"url": "string", "email": "string", "secret": "string", "answer": "<answer format>"}}, // follow the answer format the page asks for
  "other": "string or null"       // hints on formatting or edge cases, without submission details
}}

Rules:
- Reply with the JSON object only: no markdown, no code fences, no commentary.
- Missing strings are "", missing files are {{}}, missing other is null.
- Defaults for the payload: email = {email}, secret = {secret}.

QUIZ_CONTENT:
{content}

SOURCE_URL:
{url}"#,
            submission_default = submission_default,
            email = self.email,
            secret = self.secret,
            content = page.text,
            url = page.url,
        )
    }
}

const EXTRACTOR_SYSTEM_PROMPT: &str = "You are a task extractor. You read a quiz page and describe the task it asks for as strict JSON.";

/// 解析任务提取的 LLM 响应
///
/// 容忍代码围栏和前后多余文字：取第一个 `{` 到最后一个 `}` 之间的内容。
pub fn parse_task_response(response: &str) -> Result<TaskDescriptor, LlmError> {
    let trimmed = response.trim();
    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };

    serde_json::from_str(candidate).map_err(|source| LlmError::TaskParseFailed {
        response: crate::utils::truncate_text(trimmed, 200),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 创建测试用的 LlmService
    fn create_test_service() -> LlmService {
        let config = Config {
            llm_api_key: "test-key".to_string(),
            llm_api_base_url: "http://localhost:9/v1".to_string(),
            email: "me@example.com".to_string(),
            secret: "s3cret".to_string(),
            default_submission_url: Some("https://quiz.example/submit".to_string()),
            ..Default::default()
        };
        LlmService::new(&config)
    }

    fn page() -> RenderedPage {
        RenderedPage {
            url: "https://quiz.example/q1".to_string(),
            text: "What is 2 + 2? POST your answer to https://quiz.example/submit".to_string(),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let descriptor = parse_task_response(
            r#"{"task": "Add the numbers", "files": {}, "quiz_url": "u", "submission_url": "s", "payload": {"answer": 0}, "other": null}"#,
        )
        .unwrap();
        assert_eq!(descriptor.task, "Add the numbers");
        assert_eq!(descriptor.submission_url, "s");
        assert_eq!(descriptor.payload["answer"], 0);
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = "```json\n{\"task\": \"Count rows\", \"files\": {\"data.csv\": \"https://quiz.example/data.csv\"}}\n```";
        let descriptor = parse_task_response(response).unwrap();
        assert_eq!(descriptor.task, "Count rows");
        assert_eq!(
            descriptor.files.get("data.csv").map(String::as_str),
            Some("https://quiz.example/data.csv")
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(
            parse_task_response("I could not find a task"),
            Err(LlmError::TaskParseFailed { .. })
        ));
    }

    #[test]
    fn test_fill_defaults() {
        let service = create_test_service();
        let descriptor = service.fill_defaults(TaskDescriptor::default(), &page());
        assert_eq!(descriptor.quiz_url, "https://quiz.example/q1");
        assert_eq!(descriptor.submission_url, "https://quiz.example/submit");
    }

    #[test]
    fn test_extract_request_asks_for_json_object() {
        let service = create_test_service();
        let request = service
            .build_request("page", Some(EXTRACTOR_SYSTEM_PROMPT), Some(ResponseFormat::JsonObject))
            .unwrap();
        assert_eq!(request.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(request.messages.len(), 2);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = service.build_request("hi", None, None).unwrap();
        assert!(plain.response_format.is_none());
        assert_eq!(plain.messages.len(), 1);
    }

    #[test]
    fn test_extract_prompt_contains_page_and_identity() {
        let service = create_test_service();
        let prompt = service.build_extract_prompt(&page());
        assert!(prompt.contains("What is 2 + 2?"));
        assert!(prompt.contains("https://quiz.example/q1"));
        assert!(prompt.contains("me@example.com"));
        assert!(prompt.contains("https://quiz.example/submit"));
    }

    /// 测试真实的任务提取
    #[tokio::test]
    #[ignore]
    async fn test_extract_task_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = LlmService::new(&Config::from_env());
        let descriptor = service.extract_task(&page()).await.unwrap();

        println!("{:#?}", descriptor);
        assert!(!descriptor.task.is_empty());
    }
}

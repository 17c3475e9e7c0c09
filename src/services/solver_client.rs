//! 解题模型客户端 - 业务能力层
//!
//! 只负责"给出下一轮回复"能力：把完整对话和工具目录发给 OpenAI 兼容的
//! `chat/completions` 接口，返回一轮带工具调用的 assistant 消息。
//!
//! ## 重试策略
//! - 限流（429）：等待 `rate_limit_backoff` 后重试
//! - 其他失败（网络错误、超时、HTTP 错误、响应没有 `choices`）：在请求副本末尾追加一条提示后重试
//! - 达到 `max_attempts` 后返回 [`LlmError::RetriesExhausted`]
//!
//! 提示只追加到请求副本上，调用方的对话记录不受影响。

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionResponseMessage, ChatCompletionTool,
        ChatCompletionTools, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FunctionCall as OpenAiFunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::{AssistantTurn, Message, Role, ToolCall};
use crate::tools::ToolSpec;

/// 回复格式不合法时追加给模型的提示
const MALFORMED_NUDGE: &str = "Your last response is malformed";

/// 对话模型接口
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 根据完整对话与工具目录给出下一轮回复
    async fn complete(
        &self,
        conversation: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError>;

    fn model_name(&self) -> &str;
}

/// 解题模型客户端
pub struct SolverClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    request_timeout: Duration,
    max_attempts: u32,
    rate_limit_backoff: Duration,
}

/// 单次请求失败的类别
#[derive(Debug)]
enum AttemptError {
    RateLimited(String),
    Failed(String),
}

impl SolverClient {
    /// 创建新的解题模型客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(config.llm_api_base_url.trim_end_matches('/'));

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            request_timeout: Duration::from_secs(config.llm_request_timeout_secs),
            max_attempts: config.llm_max_attempts.max(1),
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
        }
    }

    /// 构建一次请求；工具目录为空时不带 `tools`
    fn build_request(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTools],
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name).messages(messages.to_vec());
        if !tools.is_empty() {
            args.tools(tools.to_vec());
        }
        args.build()
    }

    async fn send_once(&self, request: CreateChatCompletionRequest) -> Result<AssistantTurn, AttemptError> {
        let response = timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                AttemptError::Failed(format!("请求超时 ({} 秒)", self.request_timeout.as_secs()))
            })?
            .map_err(classify_error)?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| from_response_message(choice.message))
            .ok_or_else(|| AttemptError::Failed("响应中没有 choices".to_string()))
    }

    fn call_failed(&self, e: OpenAIError) -> LlmError {
        LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for SolverClient {
    async fn complete(
        &self,
        conversation: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError> {
        debug!(
            "调用解题模型，模型: {}，消息数: {}",
            self.model_name,
            conversation.len()
        );

        let mut messages = conversation
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.call_failed(e))?;
        let tools: Vec<ChatCompletionTools> = tools.iter().map(to_request_tool).collect();
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            let request = self
                .build_request(&messages, &tools)
                .map_err(|e| self.call_failed(e))?;

            match self.send_once(request).await {
                Ok(turn) => {
                    debug!("解题模型调用成功 (第 {} 次尝试)", attempt);
                    return Ok(turn);
                }
                Err(AttemptError::RateLimited(e)) => {
                    warn!(
                        "模型请求被限流 (尝试 {}/{})，等待 {} 秒后重试...",
                        attempt,
                        self.max_attempts,
                        self.rate_limit_backoff.as_secs()
                    );
                    last_error = e;
                    sleep(self.rate_limit_backoff).await;
                }
                Err(AttemptError::Failed(e)) => {
                    warn!("模型请求失败 (尝试 {}/{}): {}", attempt, self.max_attempts, e);
                    last_error = e;
                    messages.push(user_message(MALFORMED_NUDGE).map_err(|e| self.call_failed(e))?);
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            model: self.model_name.clone(),
            attempts: self.max_attempts,
            last_error,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn classify_error(error: OpenAIError) -> AttemptError {
    match &error {
        OpenAIError::ApiError(api) if is_rate_limited(api) => AttemptError::RateLimited(error.to_string()),
        _ => AttemptError::Failed(error.to_string()),
    }
}

/// 兼容服务的限流错误写法不一：`code` 可能是 `rate_limit_exceeded` 或 `429`
fn is_rate_limited(api: &ApiError) -> bool {
    let marks_rate_limit = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|v| v.contains("rate_limit") || v == "429")
    };
    marks_rate_limit(&api.code)
        || marks_rate_limit(&api.r#type)
        || api.message.to_lowercase().contains("rate limit")
}

fn user_message(content: &str) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?,
    ))
}

/// 对话消息 → 请求消息
fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.text().to_string();

    let converted = match message.role {
        Role::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()?,
        ),
        Role::User => user_message(&content)?,
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            let calls = message.tool_calls();
            // 带工具调用时内容可以省略
            if !content.is_empty() || calls.is_empty() {
                args.content(content);
            }
            if !calls.is_empty() {
                args.tool_calls(calls.iter().map(to_request_tool_call).collect::<Vec<_>>());
            }
            ChatCompletionRequestMessage::Assistant(args.build()?)
        }
        Role::Tool => ChatCompletionRequestMessage::Tool(
            ChatCompletionRequestToolMessageArgs::default()
                .content(content)
                .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
                .build()?,
        ),
    };

    Ok(converted)
}

fn to_request_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCalls {
    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
        id: call.id.clone(),
        function: OpenAiFunctionCall {
            name: call.name().to_string(),
            arguments: call.arguments().to_string(),
        },
    })
}

fn to_request_tool(spec: &ToolSpec) -> ChatCompletionTools {
    ChatCompletionTools::Function(ChatCompletionTool {
        function: FunctionObject {
            name: spec.function.name.to_string(),
            description: Some(spec.function.description.to_string()),
            parameters: Some(spec.function.parameters.clone()),
            strict: None,
        },
    })
}

/// 响应消息 → 一轮 assistant 回复，工具调用的参数文本原样保留
fn from_response_message(message: ChatCompletionResponseMessage) -> AssistantTurn {
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| match call {
            ChatCompletionMessageToolCalls::Function(call) => {
                ToolCall::new(call.id, call.function.name, call.function.arguments)
            }
            ChatCompletionMessageToolCalls::Custom(call) => {
                ToolCall::new(call.id, call.custom_tool.name, call.custom_tool.input)
            }
        })
        .collect();

    Message {
        role: Role::Assistant,
        content: message.content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
    }
}

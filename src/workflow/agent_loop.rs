//! 解题循环 - 流程层
//!
//! 核心职责：定义"一道题"的完整解题流程
//!
//! 每一轮：
//! 1. 把完整对话和工具目录交给解题模型，取回一轮回复并原样追加
//! 2. 按请求顺序逐个执行工具调用，每个调用追加一条带调用ID的工具结果
//! 3. 提交答案交给提交评估器判定，其余调用交给工具分发器
//! 4. 轮间等待固定的节流时间
//!
//! 结束条件：轮数预算用尽、评估器判定结束、模型不再调用工具、模型客户端彻底失败。
//! 结束后同一轮中剩下的调用不再执行，只回一条"已跳过"的工具结果。

use std::sync::Arc;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::AgentConfig;
use crate::error::ToolError;
use crate::models::{Message, ToolCall};
use crate::services::ChatModel;
use crate::tools::{
    format_tool_result, SubmitArgs, ToolDispatcher, ToolInvocation, ToolName, ToolRegistry, Toolbox,
};
use crate::utils::truncate_text;
use crate::workflow::agent_state::{AgentState, StopReason};
use crate::workflow::submission_evaluator::SubmissionEvaluator;
use crate::workflow::task_ctx::TaskCtx;

/// 任务结束后同一轮剩余调用的工具结果
pub const SKIPPED_CALL_MESSAGE: &str = "Skipped: the task has already finished.";

/// 解题循环
///
/// - 独占一道题的 [`AgentState`]
/// - 不持有任何资源（Browser）
/// - 只依赖模型与工具集两个接口
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
    registry: ToolRegistry,
    evaluator: SubmissionEvaluator,
    config: AgentConfig,
}

impl AgentLoop {
    /// 创建新的解题循环
    pub fn new(
        model: Arc<dyn ChatModel>,
        toolbox: Arc<dyn Toolbox>,
        registry: ToolRegistry,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            dispatcher: ToolDispatcher::new(toolbox),
            registry,
            evaluator: SubmissionEvaluator::new(config.retry_limit),
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// 运行到终止状态并交回状态
    pub async fn run(&self, mut state: AgentState, ctx: &TaskCtx) -> AgentState {
        info!(
            "{} 🤖 开始解题 (最多 {} 轮，模型: {})",
            ctx,
            self.config.max_iterations,
            self.model.model_name()
        );

        while state.is_running() {
            if state.iterations_used() >= self.config.max_iterations {
                warn!("{} ⚠️ 已用完 {} 轮预算", ctx, self.config.max_iterations);
                state.stop(StopReason::BudgetExhausted);
                break;
            }
            state.record_iteration();

            let turn = match self
                .model
                .complete(state.conversation().messages(), self.registry.catalogue())
                .await
            {
                Ok(turn) => turn,
                Err(e) => {
                    error!("{} ❌ 解题模型不可用: {}", ctx, e);
                    state.stop(StopReason::ModelUnavailable(e.to_string()));
                    break;
                }
            };

            let calls = turn.tool_calls().to_vec();
            if !turn.text().is_empty() {
                info!(
                    "{} 💬 第 {} 轮: {}",
                    ctx,
                    state.iterations_used(),
                    truncate_text(turn.text(), 200)
                );
            }
            state.push_message(turn);

            if calls.is_empty() {
                info!("{} 模型本轮没有调用工具，结束解题", ctx);
                state.stop(StopReason::NoToolCalls);
                break;
            }

            for call in &calls {
                let content = if state.is_running() {
                    self.handle_call(call, &mut state, ctx).await
                } else {
                    info!("{} ⏭️ 任务已结束，跳过调用: {}", ctx, call.name());
                    SKIPPED_CALL_MESSAGE.to_string()
                };
                state.push_message(Message::tool(call.id.clone(), content));
            }

            // 轮间节流；已结束或已到最后一轮时不再等待
            if state.is_running()
                && state.iterations_used() < self.config.max_iterations
                && !self.config.pacing_delay.is_zero()
            {
                sleep(self.config.pacing_delay).await;
            }
        }

        info!(
            "{} 🏁 解题结束: {} (轮数 {}，提交 {} 次)",
            ctx,
            state
                .stop_reason()
                .map(ToString::to_string)
                .unwrap_or_default(),
            state.iterations_used(),
            state.retry_count()
        );

        state
    }

    /// 执行一个工具调用，返回工具结果消息的文本
    async fn handle_call(&self, call: &ToolCall, state: &mut AgentState, ctx: &TaskCtx) -> String {
        info!("{} 🔧 调用工具: {}", ctx, call.name());

        match ToolInvocation::parse(call) {
            Ok(ToolInvocation::Submit(args)) => self.handle_submission(&args, call, state, ctx).await,
            Ok(ToolInvocation::Action(action)) => {
                let result = self.dispatcher.execute(&action, call.arguments()).await;
                if let Err(e) = &result {
                    warn!("{} ⚠️ 工具 {} 出错: {}", ctx, e.tool_name(), e);
                }
                format_tool_result(&result)
            }
            Err(e) => {
                warn!("{} ⚠️ 工具 {} 调用不合法: {}", ctx, e.tool_name(), e);
                format_tool_result(&Err(e))
            }
        }
    }

    /// 提交答案并交给评估器判定
    ///
    /// 提交次数在发送前累加；payload 不合法或请求失败都算一次尝试，且不改变运行状态。
    async fn handle_submission(
        &self,
        args: &SubmitArgs,
        call: &ToolCall,
        state: &mut AgentState,
        ctx: &TaskCtx,
    ) -> String {
        state.record_submission_attempt();
        info!(
            "{} 📤 第 {} 次提交答案到: {}",
            ctx,
            state.retry_count(),
            args.submission_url
        );

        let submitted = match args.payload_value() {
            Ok(payload) => self
                .dispatcher
                .toolbox()
                .submit_answer(&args.submission_url, payload)
                .await
                .map_err(|e| format!("{:#}", e)),
            Err(e) => Err(e.to_string()),
        };

        match submitted {
            Ok(outcome) => self
                .evaluator
                .evaluate(&outcome, state, Instant::now())
                .feedback(),
            Err(message) => {
                let error = ToolError::Execution {
                    tool: ToolName::SubmitAnswer.as_str().to_string(),
                    arguments: call.arguments().to_string(),
                    message,
                };
                warn!("{} ⚠️ {}", ctx, error);
                format_tool_result(&Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};

    use crate::error::LlmError;
    use crate::models::{AssistantTurn, CodeOutput, RenderedPage, SubmissionOutcome};
    use crate::tools::ToolSpec;

    /// 按顺序返回预设回复的模型
    struct ScriptedModel {
        turns: Mutex<VecDeque<Result<AssistantTurn, LlmError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Result<AssistantTurn, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _conversation: &[Message],
            _tools: &[ToolSpec],
        ) -> Result<AssistantTurn, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Message::assistant("", Vec::new())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// 记录调用、按顺序返回预设提交结果的工具集
    #[derive(Default)]
    struct ScriptedToolbox {
        outcomes: Mutex<VecDeque<SubmissionOutcome>>,
        invoked: Mutex<Vec<String>>,
    }

    impl ScriptedToolbox {
        fn with_outcomes(outcomes: Vec<SubmissionOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                invoked: Mutex::new(Vec::new()),
            })
        }

        fn invoked(&self) -> Vec<String> {
            self.invoked.lock().unwrap().clone()
        }

        fn record(&self, name: &str) {
            self.invoked.lock().unwrap().push(name.to_string());
        }
    }

    #[async_trait]
    impl Toolbox for ScriptedToolbox {
        async fn render_page(&self, url: &str) -> anyhow::Result<RenderedPage> {
            self.record("get_rendered_html");
            Ok(RenderedPage {
                url: url.to_string(),
                ..Default::default()
            })
        }

        async fn run_code(&self, _code: &str) -> anyhow::Result<CodeOutput> {
            self.record("run_code");
            Ok(CodeOutput {
                stdout: "42\n".to_string(),
                stderr: String::new(),
                return_code: Some(0),
            })
        }

        async fn download_file(&self, _url: &str, _filename: &str) -> anyhow::Result<String> {
            self.record("download_file");
            Err(anyhow!("connection refused"))
        }

        async fn add_dependencies(&self, _dependencies: &[String]) -> anyhow::Result<String> {
            self.record("add_dependencies");
            Ok("ok".to_string())
        }

        async fn transcribe_audio(&self, _file_path: &str) -> anyhow::Result<String> {
            self.record("transcribe_audio");
            Ok("hello".to_string())
        }

        async fn ocr_image(&self, _image: &str, _lang: &str) -> anyhow::Result<String> {
            self.record("ocr_image_tool");
            Ok("text".to_string())
        }

        async fn encode_image(&self, _image_path: &str) -> anyhow::Result<String> {
            self.record("encode_image_to_base64");
            Ok("aGk=".to_string())
        }

        async fn submit_answer(
            &self,
            _submission_url: &str,
            _payload: JsonValue,
        ) -> anyhow::Result<SubmissionOutcome> {
            self.record("submit_answer");
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("submission endpoint unreachable"))
        }
    }

    fn config(max_iterations: u32) -> AgentConfig {
        AgentConfig {
            max_iterations,
            retry_limit: 2,
            task_timeout: Duration::from_secs(180),
            pacing_delay: Duration::ZERO,
        }
    }

    fn submit_call(id: &str) -> ToolCall {
        let args = json!({
            "submission_url": "https://quiz.example/submit",
            "payload": "{\"answer\": 42}"
        });
        ToolCall::new(id, "submit_answer", args.to_string())
    }

    fn turn(calls: Vec<ToolCall>) -> Result<AssistantTurn, LlmError> {
        Ok(Message::assistant("thinking", calls))
    }

    fn fresh_state(config: &AgentConfig) -> AgentState {
        AgentState::new(
            vec![Message::system("sys"), Message::user("task")],
            Instant::now(),
            config,
        )
    }

    fn agent(model: Arc<ScriptedModel>, toolbox: Arc<ScriptedToolbox>, config: AgentConfig) -> AgentLoop {
        AgentLoop::new(model, toolbox, ToolRegistry::new().unwrap(), config)
    }

    #[tokio::test]
    async fn test_accept_skips_remaining_calls() {
        let model = ScriptedModel::new(vec![turn(vec![
            submit_call("call_1"),
            ToolCall::new("call_2", "run_code", r#"{"code": "print(1)"}"#),
        ])]);
        let toolbox = ScriptedToolbox::with_outcomes(vec![SubmissionOutcome {
            correct: Some(true),
            next_url: Some("https://quiz.example/2".to_string()),
            reason: None,
        }]);
        let config = config(20);

        let state = agent(model.clone(), toolbox.clone(), config)
            .run(fresh_state(&config), &TaskCtx::new(1, "u"))
            .await;

        assert_eq!(state.stop_reason(), Some(&StopReason::Accepted));
        assert_eq!(state.next_url(), Some("https://quiz.example/2"));
        assert_eq!(model.calls(), 1);
        assert_eq!(toolbox.invoked(), vec!["submit_answer"]);

        let messages = state.conversation().messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].text(), "Task completed successfully you can stop!");
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_2"));
        assert_eq!(messages[4].text(), SKIPPED_CALL_MESSAGE);
    }

    #[tokio::test]
    async fn test_turn_without_tool_calls_stops() {
        let model = ScriptedModel::new(vec![Ok(Message::assistant("The answer is 4.", Vec::new()))]);
        let toolbox = ScriptedToolbox::with_outcomes(Vec::new());
        let config = config(20);

        let state = agent(model.clone(), toolbox, config)
            .run(fresh_state(&config), &TaskCtx::new(1, "u"))
            .await;

        assert_eq!(state.stop_reason(), Some(&StopReason::NoToolCalls));
        assert_eq!(state.iterations_used(), 1);
        assert_eq!(state.conversation().messages().len(), 3);
    }

    #[tokio::test]
    async fn test_model_failure_is_terminal() {
        let model = ScriptedModel::new(vec![Err(LlmError::RetriesExhausted {
            model: "scripted".to_string(),
            attempts: 5,
            last_error: "HTTP 500".to_string(),
        })]);
        let toolbox = ScriptedToolbox::with_outcomes(Vec::new());
        let config = config(20);

        let state = agent(model, toolbox, config)
            .run(fresh_state(&config), &TaskCtx::new(1, "u"))
            .await;

        assert!(matches!(
            state.stop_reason(),
            Some(StopReason::ModelUnavailable(message)) if message.contains("HTTP 500")
        ));
        assert_eq!(state.conversation().messages().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_payload_are_reported() {
        let bad_payload = ToolCall::new(
            "call_2",
            "submit_answer",
            json!({"submission_url": "https://quiz.example/submit", "payload": "[1, 2]"}).to_string(),
        );
        let model = ScriptedModel::new(vec![turn(vec![
            ToolCall::new("call_1", "delete_everything", "{}"),
            bad_payload,
        ])]);
        let toolbox = ScriptedToolbox::with_outcomes(Vec::new());
        let config = config(1);

        let state = agent(model, toolbox.clone(), config)
            .run(fresh_state(&config), &TaskCtx::new(1, "u"))
            .await;

        let messages = state.conversation().messages();
        assert!(messages[3].text().contains("Unknown tool 'delete_everything'"));
        assert!(messages[4].text().starts_with("Tool call resulted in: {\"error\""));
        assert!(messages[4].text().contains("submit_answer"));
        assert_eq!(state.retry_count(), 1);
        assert!(toolbox.invoked().is_empty());
        assert_eq!(state.stop_reason(), Some(&StopReason::BudgetExhausted));
    }

    #[tokio::test]
    async fn test_submission_network_error_keeps_running() {
        let model = ScriptedModel::new(vec![
            turn(vec![submit_call("call_1")]),
            Ok(Message::assistant("giving up", Vec::new())),
        ]);
        let toolbox = ScriptedToolbox::with_outcomes(Vec::new());
        let config = config(20);

        let state = agent(model, toolbox, config)
            .run(fresh_state(&config), &TaskCtx::new(1, "u"))
            .await;

        let messages = state.conversation().messages();
        assert!(messages[3].text().contains("submission endpoint unreachable"));
        assert_eq!(state.retry_count(), 1);
        assert_eq!(state.iterations_used(), 2);
        assert_eq!(state.stop_reason(), Some(&StopReason::NoToolCalls));
    }
}

//! 单道题的解题状态
//!
//! 由一次解题循环独占，题目之间不共享。只有解题循环与提交评估器可以修改它。

use std::fmt;
use std::time::Instant;

use crate::config::AgentConfig;
use crate::models::Message;

/// 只能追加的对话记录
///
/// 插入顺序即协议顺序，模型依赖消息的位置关系。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(seed: Vec<Message>) -> Self {
        Self { messages: seed }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

}

/// 解题循环结束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 答案正确
    Accepted,
    /// 超过重试次数，服务端已给出下一题
    Advanced,
    /// 超时放弃
    Abandoned,
    /// 模型本轮没有调用任何工具
    NoToolCalls,
    /// 用完了轮数预算
    BudgetExhausted,
    /// 模型客户端重试后仍然失败
    ModelUnavailable(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Accepted => write!(f, "答案正确"),
            StopReason::Advanced => write!(f, "超过重试次数，前进到下一题"),
            StopReason::Abandoned => write!(f, "超时放弃"),
            StopReason::NoToolCalls => write!(f, "模型未再调用工具"),
            StopReason::BudgetExhausted => write!(f, "轮数预算用尽"),
            StopReason::ModelUnavailable(e) => write!(f, "模型不可用: {}", e),
        }
    }
}

/// 解题状态
#[derive(Debug, Clone)]
pub struct AgentState {
    conversation: Conversation,
    retry_count: u32,
    iterations_used: u32,
    deadline: Instant,
    running: bool,
    next_url: Option<String>,
    stop_reason: Option<StopReason>,
}

impl AgentState {
    /// 用种子对话（system + user）创建新状态
    ///
    /// `started_at` 是开始处理这道题的时刻，超时从这里算起。
    pub fn new(seed: Vec<Message>, started_at: Instant, config: &AgentConfig) -> Self {
        Self {
            conversation: Conversation::new(seed),
            retry_count: 0,
            iterations_used: 0,
            deadline: started_at + config.task_timeout,
            running: true,
            next_url: None,
            stop_reason: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn iterations_used(&self) -> u32 {
        self.iterations_used
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 下一题地址，只由提交结果设置
    pub fn next_url(&self) -> Option<&str> {
        self.next_url.as_deref()
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.conversation.push(message);
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations_used += 1;
    }

    /// 每次提交尝试调用一次
    pub(crate) fn record_submission_attempt(&mut self) {
        self.retry_count += 1;
    }

    pub(crate) fn set_next_url(&mut self, next_url: Option<String>) {
        self.next_url = next_url;
    }

    /// 进入终止状态；只记录第一次的原因
    pub(crate) fn stop(&mut self, reason: StopReason) {
        if self.running {
            self.running = false;
            self.stop_reason = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_state_is_fresh() {
        let config = AgentConfig::default();
        let started = Instant::now();
        let state = AgentState::new(
            vec![Message::system("sys"), Message::user("task")],
            started,
            &config,
        );

        assert!(state.is_running());
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.iterations_used(), 0);
        assert_eq!(state.next_url(), None);
        assert_eq!(state.conversation().messages().len(), 2);
        assert_eq!(state.deadline(), started + Duration::from_secs(180));
    }

    #[test]
    fn test_stop_keeps_first_reason() {
        let mut state = AgentState::new(Vec::new(), Instant::now(), &AgentConfig::default());
        state.stop(StopReason::Accepted);
        state.stop(StopReason::BudgetExhausted);
        assert!(!state.is_running());
        assert_eq!(state.stop_reason(), Some(&StopReason::Accepted));
    }
}

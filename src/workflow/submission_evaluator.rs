//! 提交评估器
//!
//! 把一次提交的结果归类为 接受 / 前进 / 重试 / 放弃，并据此修改解题状态。
//! 判定按以下顺序，命中即止：
//!
//! 1. `correct == true` → 接受
//! 2. 提交次数超过重试上限且有下一题 → 前进
//! 3. 没有下一题 → 重试
//! 4. 距开始已超时 → 放弃
//! 5. 其余 → 重试
//!
//! 超时只在第 4 步检查：没有下一题时即使超时也会继续重试，直到轮数预算用尽。

use std::time::Instant;

use tracing::{info, warn};

use crate::models::SubmissionOutcome;
use crate::workflow::agent_state::{AgentState, StopReason};

/// 提交判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 答案正确
    Accept,
    /// 放弃当前题目，前进到服务端给出的下一题
    Advance { next_url: String },
    /// 继续尝试
    Retry { reason: Option<String> },
    /// 超时放弃
    Abandon,
}

impl Verdict {
    /// 回传给模型的工具结果文本
    pub fn feedback(&self) -> String {
        match self {
            Verdict::Accept => "Task completed successfully you can stop!".to_string(),
            Verdict::Advance { .. } => {
                "Task completed, moving on to the next task. You can stop!".to_string()
            }
            Verdict::Retry { reason } => format!(
                "Retry again! Your previous answer was wrong because, {}",
                reason.as_deref().unwrap_or("no reason was given")
            ),
            Verdict::Abandon => "Task completed".to_string(),
        }
    }
}

/// 提交评估器
#[derive(Debug, Clone, Copy)]
pub struct SubmissionEvaluator {
    retry_limit: u32,
}

impl SubmissionEvaluator {
    pub fn new(retry_limit: u32) -> Self {
        Self { retry_limit }
    }

    /// 评估一次提交结果
    ///
    /// 调用前 `state` 已记录本次提交尝试；`now` 用于超时判断。
    pub fn evaluate(
        &self,
        outcome: &SubmissionOutcome,
        state: &mut AgentState,
        now: Instant,
    ) -> Verdict {
        state.set_next_url(outcome.next_url.clone());

        let verdict = if outcome.is_correct() {
            Verdict::Accept
        } else if let Some(next_url) = outcome
            .next_url
            .as_ref()
            .filter(|_| state.retry_count() > self.retry_limit)
        {
            Verdict::Advance {
                next_url: next_url.clone(),
            }
        } else if outcome.next_url.is_none() {
            Verdict::Retry {
                reason: outcome.reason.clone(),
            }
        } else if now >= state.deadline() {
            Verdict::Abandon
        } else {
            Verdict::Retry {
                reason: outcome.reason.clone(),
            }
        };

        match &verdict {
            Verdict::Accept => {
                info!("✅ 答案正确 (第 {} 次提交)", state.retry_count());
                state.stop(StopReason::Accepted);
            }
            Verdict::Advance { next_url } => {
                warn!(
                    "⏭️ 已提交 {} 次仍未答对，前进到下一题: {}",
                    state.retry_count(),
                    next_url
                );
                state.stop(StopReason::Advanced);
            }
            Verdict::Abandon => {
                warn!("⏰ 已超时，放弃当前题目");
                state.stop(StopReason::Abandoned);
            }
            Verdict::Retry { reason } => {
                info!(
                    "🔁 答案错误 (第 {} 次提交): {}",
                    state.retry_count(),
                    reason.as_deref().unwrap_or("未给出原因")
                );
            }
        }

        verdict
    }
}

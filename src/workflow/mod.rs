//! 流程层：定义"一道题"的完整解题流程

pub mod agent_loop;
pub mod agent_state;
pub mod prompts;
pub mod submission_evaluator;
pub mod task_ctx;

pub use agent_loop::AgentLoop;
pub use agent_state::{AgentState, Conversation, StopReason};
pub use prompts::{seed_conversation, Identity};
pub use submission_evaluator::{SubmissionEvaluator, Verdict};
pub use task_ctx::TaskCtx;

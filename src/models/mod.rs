pub mod message;
pub mod task;
pub mod tool_output;

pub use message::{AssistantTurn, FunctionCall, Message, Role, ToolCall};
pub use task::{PreparedTask, SubmissionOutcome, TaskDescriptor};
pub use tool_output::{CodeOutput, RenderedPage};

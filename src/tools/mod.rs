//! 工具层
//!
//! - `registry` - 封闭的工具集合与发给模型的工具目录
//! - `toolbox` - 工具处理函数接口
//! - `dispatcher` - 参数校验、执行与错误包装

pub mod dispatcher;
pub mod registry;
pub mod toolbox;

pub use dispatcher::{format_tool_result, SubmitArgs, ToolAction, ToolDispatcher, ToolInvocation, ToolResult};
pub use registry::{ToolName, ToolRegistry, ToolSpec};
pub use toolbox::Toolbox;

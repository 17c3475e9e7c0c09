//! 工具返回的结构化结果

use serde::{Deserialize, Serialize};

/// 渲染后的页面
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub url: String,
    /// 可读文本，链接改写为 `文本 (URL)`，图片改写为 `[Image: URL]`
    pub text: String,
    /// 页面中出现的所有 href / src 绝对地址
    pub files: Vec<String>,
}

/// 一次代码执行的输出
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOutput {
    pub stdout: String,
    pub stderr: String,
    /// 进程被信号终止时为 None
    pub return_code: Option<i32>,
}

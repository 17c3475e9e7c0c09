//! 解题对话的种子提示词

use serde_json::Value as JsonValue;

use crate::models::{Message, PreparedTask};

/// 解题模型的系统提示词
pub const SOLVER_SYSTEM_PROMPT: &str = "\
You are an autonomous quiz solver. Solve computational and logic tasks with the tools you are given.

Guidelines:
1. Reason step by step and explain what you are about to do before calling a tool.
2. Act on your own: use the tools to download files, run Python code and inspect data instead of asking for help.
3. If a file the task needs is missing locally, download it first with `download_file`.
4. Do every calculation and data transformation by writing Python and running it with `run_code`; never estimate results in your head.
5. Submit the final answer with `submit_answer` to the submission URL given in the task.
6. Do not download files larger than 100 megabytes.";

/// 提交身份
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

/// 构建解题模型的用户提示词
pub fn solver_user_prompt(task: &PreparedTask, identity: &Identity) -> String {
    let descriptor = &task.descriptor;
    let payload = serde_json::to_string_pretty(&JsonValue::Object(descriptor.payload.clone()))
        .unwrap_or_else(|_| "{}".to_string());
    let files = if task.local_files.is_empty() {
        "none".to_string()
    } else {
        task.local_files.join(", ")
    };

    format!(
        r#"Here is the task you need to complete:
- Task: {task}
- Additional context: {other}
- Files: {files}
  (They have already been downloaded to the working directory. If one is missing, download it yourself.)

Submission:
- Submission URL: {submission_url}
- Payload schema:
```json
{payload}
```

Credentials:
Email: {email}
Secret: {secret}

Original problem URL: {url} (use it only to re-check the instructions or locate missing data).

Start by analysing the task, then carry out the necessary steps.
Every reply must contain at least one tool call."#,
        task = descriptor.task,
        other = descriptor.other.as_deref().unwrap_or("none"),
        files = files,
        submission_url = descriptor.submission_url,
        payload = payload,
        email = identity.email,
        secret = identity.secret,
        url = task.url,
    )
}

/// 一道题的种子对话：system + user
pub fn seed_conversation(task: &PreparedTask, identity: &Identity) -> Vec<Message> {
    vec![
        Message::system(SOLVER_SYSTEM_PROMPT),
        Message::user(solver_user_prompt(task, identity)),
    ]
}

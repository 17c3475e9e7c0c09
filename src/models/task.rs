//! 任务描述与提交结果

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 从题目页面中提取出的结构化任务
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDescriptor {
    /// 需要完成的任务
    pub task: String,
    /// 对解题有帮助的补充信息
    pub other: Option<String>,
    /// 文件名 -> 下载地址
    pub files: BTreeMap<String, String>,
    pub quiz_url: String,
    pub submission_url: String,
    /// 提交 payload 的结构
    #[serde(alias = "payload_schema")]
    pub payload: Map<String, JsonValue>,
}

/// 准备就绪、可以交给解题循环的任务
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTask {
    /// 题目页面地址
    pub url: String,
    pub descriptor: TaskDescriptor,
    /// 已下载到本地的文件（下载失败的保留原始地址）
    pub local_files: Vec<String>,
}

/// 提交接口返回的判定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionOutcome {
    pub correct: Option<bool>,
    /// 空字符串视为没有下一题
    #[serde(deserialize_with = "non_empty_string")]
    pub next_url: Option<String>,
    pub reason: Option<String>,
}

impl SubmissionOutcome {
    pub fn is_correct(&self) -> bool {
        self.correct == Some(true)
    }
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_tolerates_missing_keys() {
        let descriptor: TaskDescriptor = serde_json::from_value(json!({
            "task": "Sum the second column",
            "files": {"data.csv": "https://quiz.example/data.csv"},
            "other": null
        }))
        .unwrap();

        assert_eq!(descriptor.task, "Sum the second column");
        assert_eq!(descriptor.other, None);
        assert_eq!(descriptor.submission_url, "");
        assert!(descriptor.payload.is_empty());
        assert_eq!(descriptor.files.len(), 1);
    }

    #[test]
    fn test_outcome_treats_empty_next_url_as_absent() {
        let outcome: SubmissionOutcome =
            serde_json::from_value(json!({"correct": false, "url": "", "next_url": "", "reason": "off by one"}))
                .unwrap();
        assert_eq!(outcome.next_url, None);
        assert!(!outcome.is_correct());
        assert_eq!(outcome.reason.as_deref(), Some("off by one"));
    }

    #[test]
    fn test_outcome_with_missing_fields() {
        let outcome: SubmissionOutcome = serde_json::from_value(json!({})).unwrap();
        assert_eq!(outcome, SubmissionOutcome::default());
    }
}

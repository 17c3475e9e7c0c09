//! 答案提交服务 - 业务能力层
//!
//! 只负责"把 payload POST 到提交地址并读回判定"能力，不关心是否重试

use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::SubmissionError;
use crate::models::SubmissionOutcome;
use crate::utils::truncate_text;

/// 提交请求超时
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// 答案提交服务
///
/// 职责：
/// - 用配置的身份覆盖 payload 中的 email / secret
/// - 发送 POST 请求
/// - 不论 HTTP 状态码都按 JSON 解析响应体
pub struct Submitter {
    http: reqwest::Client,
    email: String,
    secret: String,
}

impl Submitter {
    /// 创建新的提交服务
    pub fn new(config: &Config) -> Result<Self, SubmissionError> {
        let http = reqwest::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()
            .map_err(|source| SubmissionError::RequestFailed {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            http,
            email: config.email.clone(),
            secret: config.secret.clone(),
        })
    }

    /// 提交答案
    ///
    /// # 参数
    /// - `submission_url`: 提交地址
    /// - `payload`: 必须是 JSON 对象
    pub async fn submit(
        &self,
        submission_url: &str,
        payload: JsonValue,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let payload = self.with_identity(payload)?;
        debug!(
            "提交答案到 {}: {}",
            submission_url,
            truncate_text(&payload.to_string(), 200)
        );

        let response = self
            .http
            .post(submission_url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| SubmissionError::RequestFailed {
                url: submission_url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| SubmissionError::RequestFailed {
                url: submission_url.to_string(),
                source,
            })?;

        let outcome = parse_outcome(status, &body)?;
        info!(
            "📨 提交结果: HTTP {} | correct={:?} | next_url={:?}",
            status, outcome.correct, outcome.next_url
        );
        Ok(outcome)
    }

    /// 用配置的身份覆盖 payload；未配置的字段保持原样
    fn with_identity(&self, payload: JsonValue) -> Result<JsonValue, SubmissionError> {
        let JsonValue::Object(mut fields) = payload else {
            return Err(SubmissionError::InvalidPayload(payload.to_string()));
        };
        if !self.email.is_empty() {
            fields.insert("email".to_string(), JsonValue::String(self.email.clone()));
        }
        if !self.secret.is_empty() {
            fields.insert("secret".to_string(), JsonValue::String(self.secret.clone()));
        }
        Ok(JsonValue::Object(fields))
    }
}

/// 解析提交接口的响应体
pub fn parse_outcome(status: u16, body: &str) -> Result<SubmissionOutcome, SubmissionError> {
    serde_json::from_str(body).map_err(|_| SubmissionError::BadResponse {
        status,
        body: truncate_text(body, 500),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submitter(email: &str, secret: &str) -> Submitter {
        let config = Config {
            email: email.to_string(),
            secret: secret.to_string(),
            ..Default::default()
        };
        Submitter::new(&config).unwrap()
    }

    #[test]
    fn test_identity_overwrites_payload_fields() {
        let payload = submitter("me@example.com", "s3cret")
            .with_identity(json!({"email": "wrong", "answer": 42}))
            .unwrap();
        assert_eq!(payload["email"], "me@example.com");
        assert_eq!(payload["secret"], "s3cret");
        assert_eq!(payload["answer"], 42);
    }

    #[test]
    fn test_empty_identity_keeps_payload() {
        let payload = submitter("", "")
            .with_identity(json!({"email": "model@example.com"}))
            .unwrap();
        assert_eq!(payload["email"], "model@example.com");
        assert!(payload.get("secret").is_none());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert!(matches!(
            submitter("a", "b").with_identity(json!([1, 2])),
            Err(SubmissionError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_outcome_ignores_status() {
        let outcome = parse_outcome(400, r#"{"correct": false, "url": "", "reason": "off by one"}"#).unwrap();
        assert_eq!(outcome.correct, Some(false));
        assert_eq!(outcome.next_url, None);
        assert_eq!(outcome.reason.as_deref(), Some("off by one"));

        let outcome = parse_outcome(200, r#"{"correct": true, "next_url": "https://quiz.example/2"}"#).unwrap();
        assert!(outcome.is_correct());
        assert_eq!(outcome.next_url.as_deref(), Some("https://quiz.example/2"));
    }

    #[test]
    fn test_parse_outcome_rejects_html() {
        assert!(matches!(
            parse_outcome(502, "<html>Bad Gateway</html>"),
            Err(SubmissionError::BadResponse { status: 502, .. })
        ));
    }
}

//! HTTP client for the external agent execution API.

use std::path::Path;
use std::time::Duration;

use reqwest::Response;
use reqwest::multipart;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::error::ClientResult;
use crate::model::AgentConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "CHATBOT_API_URL";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ExecutionClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ExecutionClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Registers (or replaces) the runnable agent system for a chatbot.
    pub async fn register_config(&self, chatbot_id: &str, config: &AgentConfig) -> ClientResult<()> {
        let url = self.endpoint(&["api", "chatbots", chatbot_id])?;
        debug!(%url, "registering agent configuration");
        let response = self
            .http
            .post(url)
            .json(&json!({ "config": config }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn send_test_message(&self, chatbot_id: &str, message: &str) -> ClientResult<TestReply> {
        let url = self.endpoint(&["api", "chatbots", chatbot_id, "message"])?;
        debug!(%url, "sending test message");
        let response = self
            .http
            .post(url)
            .json(&json!({ "message": message, "context": {} }))
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        TestReply::from_value(body)
    }

    /// Sends a widget message; the reply's `response` text is returned.
    pub async fn send_widget_message(&self, agent_id: &str, message: &str) -> ClientResult<String> {
        let url = self.endpoint(&["api", "message"])?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "agent_id": agent_id, "message": message, "stream": false }))
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        match body {
            Value::String(text) => Ok(text),
            Value::Object(mut map) => match map.remove("response") {
                Some(Value::String(text)) => Ok(text),
                Some(other) => Ok(other.to_string()),
                None => Err(ClientError::Decode("missing `response` field".to_string())),
            },
            other => Err(ClientError::Decode(format!("expected an object, got {other}"))),
        }
    }

    /// Uploads a file for retrieval and returns the vector store id it was indexed into.
    pub async fn upload_agent_file(&self, chatbot_id: &str, path: &Path) -> ClientResult<String> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let url = self.endpoint(&["api", "agents", chatbot_id, "files"])?;
        debug!(%url, path = %path.display(), "uploading agent file");
        let response = self.http.post(url).multipart(form).send().await?;
        let body: UploadResponse = check_status(response).await?.json().await?;
        Ok(body.vector_store_id)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    vector_store_id: String,
}

pub(crate) async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        detail: error_detail(&body, status.canonical_reason().unwrap_or("request failed")),
    })
}

/// Prefers the server's `detail` field, then the raw body, then `fallback`.
fn error_detail(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("detail").or_else(|| map.get("error")) {
            Some(Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        fallback.to_string()
    } else {
        body.to_string()
    }
}

/// Final reply of a test invocation plus any judge-loop trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReply {
    pub response: String,
    pub iterations: Vec<Iteration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Iteration {
    pub content: String,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: Option<Value>,
    pub feedback: Option<String>,
}

impl TestReply {
    pub fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::String(response) => Ok(Self {
                response,
                iterations: Vec::new(),
            }),
            Value::Object(map) => {
                let response = map
                    .get("response")
                    .or_else(|| map.get("content"))
                    .map(text_of)
                    .ok_or_else(|| ClientError::Decode("missing `response` or `content` field".to_string()))?;
                let iterations = match map.get("iterations") {
                    Some(Value::Array(items)) => items.iter().map(Iteration::from_value).collect(),
                    _ => Vec::new(),
                };
                Ok(Self { response, iterations })
            }
            other => Err(ClientError::Decode(format!(
                "expected a string or object reply, got {other}"
            ))),
        }
    }
}

impl Iteration {
    fn from_value(value: &Value) -> Self {
        let content = value
            .get("content")
            .or_else(|| value.get("generated_content"))
            .map(text_of)
            .unwrap_or_default();
        let evaluation = value.get("evaluation").filter(|v| v.is_object()).map(|evaluation| Evaluation {
            score: evaluation.get("score").filter(|v| !v.is_null()).cloned(),
            feedback: evaluation.get("feedback").map(text_of),
        });
        Self { content, evaluation }
    }

    /// Whether the evaluator's score equals the judge loop's pass value.
    pub fn passed(&self, pass_value: &str) -> bool {
        let Some(score) = self.evaluation.as_ref().and_then(|e| e.score.as_ref()) else {
            return false;
        };
        match score {
            Value::String(text) => text.trim().eq_ignore_ascii_case(pass_value.trim()),
            Value::Bool(flag) => pass_value.trim().parse::<bool>().is_ok_and(|expected| expected == *flag),
            Value::Number(number) => number.to_string() == pass_value.trim(),
            _ => false,
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoints_keep_base_path_and_escape_ids() {
        let client = ExecutionClient::new("https://exec.example.com/v1/").unwrap();
        let url = client.endpoint(&["api", "chatbots", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://exec.example.com/v1/api/chatbots/a%20b");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(
            ExecutionClient::new("ftp://exec.example.com"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
        assert!(ExecutionClient::new("not a url").is_err());
    }

    #[test]
    fn plain_string_reply() {
        let reply = TestReply::from_value(json!("hello")).unwrap();
        assert_eq!(reply.response, "hello");
        assert!(reply.iterations.is_empty());
    }

    #[test]
    fn object_reply_with_trace() {
        let reply = TestReply::from_value(json!({
            "content": "final",
            "iterations": [
                {"generated_content": "draft", "evaluation": {"score": "fail", "feedback": "too short"}},
                {"content": "final", "evaluation": {"score": "PASS", "feedback": "ok"}},
                {"content": "no evaluation"}
            ]
        }))
        .unwrap();
        assert_eq!(reply.response, "final");
        assert_eq!(reply.iterations.len(), 3);
        assert_eq!(reply.iterations[0].content, "draft");
        assert!(!reply.iterations[0].passed("pass"));
        assert!(reply.iterations[1].passed("pass"));
        assert!(!reply.iterations[2].passed("pass"));
    }

    #[test]
    fn boolean_and_numeric_scores() {
        let iteration = Iteration::from_value(&json!({"content": "x", "evaluation": {"score": true}}));
        assert!(iteration.passed("true"));
        let iteration = Iteration::from_value(&json!({"content": "x", "evaluation": {"score": 1}}));
        assert!(iteration.passed("1"));
        assert!(!iteration.passed("pass"));
    }

    #[test]
    fn detail_is_preferred_over_body() {
        assert_eq!(error_detail(r#"{"detail":"bad config"}"#, "x"), "bad config");
        assert_eq!(error_detail("upstream exploded", "x"), "upstream exploded");
        assert_eq!(error_detail("", "Internal Server Error"), "Internal Server Error");
    }
}

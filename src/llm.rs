//! Shared OpenAI-style chat-completion client used by C4's model-assisted
//! date tier and C6's relevance analyzer (§6: "OpenAI-style chat: POST
//! with `model`, `messages` (system + user), `temperature`, `max_tokens`,
//! and `response_format` requesting JSON when available").
//!
//! Both callers go through [`LlmClient::chat`], which applies the crate's
//! shared retry policy ([`crate::resilience::retry`]) and a per-call
//! timeout, classifying 429/5xx and network failures as
//! [`crate::Error`] transient variants so they retry, and 4xx as
//! permanent so they don't.

use crate::resilience::TimeoutExt;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Request parameters for a single chat call, kept separate from the
/// client so the client itself stays stateless beyond its credentials
/// (matching the adapter statelessness note in §5).
#[derive(Debug, Clone)]
pub struct ChatCall {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
    pub timeout: Duration,
}

/// Thin client over an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Issue one chat-completion call, retrying transient failures
    /// (network errors, 429, 5xx) up to the crate's default retry policy
    /// and applying `call.timeout` to each individual attempt.
    pub async fn chat(&self, call: &ChatCall) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: call.model.clone(),
            messages: vec![
                ChatMessage::system(call.system.clone()),
                ChatMessage::user(call.user.clone()),
            ],
            temperature: call.temperature,
            max_tokens: call.max_tokens,
            response_format: call
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let attempt = || async {
            debug!(model = %call.model, url = %url, "calling chat completion endpoint");
            let send = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send();
            let response = send
                .with_timeout_duration(call.timeout)
                .await?
                .map_err(Error::Http)?;

            classify_status(response.status())?;

            let body: ChatResponse = response.json().await.map_err(Error::Http)?;
            body.choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| Error::ModelMalformedResponse("empty choices array".to_string()))
        };

        crate::resilience::retry(attempt, "llm_chat").await
    }
}

fn classify_status(status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(%status, "llm endpoint rate limited");
        return Err(Error::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        });
    }
    if status.is_server_error() {
        warn!(%status, "llm endpoint server error");
        return Err(Error::ServiceUnavailable {
            service: "llm".to_string(),
            reason: status.to_string(),
        });
    }
    Err(Error::InvalidInput {
        field: "llm_request".to_string(),
        reason: format!("llm endpoint returned {status}"),
    })
}

/// Strip defensive wrappers a chat model may put around a JSON payload:
/// fenced code blocks, then the first balanced `{...}` substring. Shared
/// by C6's response parser and any caller that expects raw JSON back.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let unfenced = strip_code_fence(trimmed);
    if unfenced.starts_with('{') && unfenced.ends_with('}') {
        return Some(unfenced);
    }

    first_balanced_object(unfenced)
}

fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest.trim_start_matches("json").trim_start_matches('\n');
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    s
}

fn first_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_clean_json() {
        let raw = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(raw), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn strips_fenced_json_code_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn extracts_first_balanced_object_from_prose() {
        let raw = "Sure, here you go: {\"a\": 1, \"b\": {\"c\": 2}} - hope that helps!";
        assert_eq!(
            extract_json_object(raw),
            Some("{\"a\": 1, \"b\": {\"c\": 2}}")
        );
    }

    #[test]
    fn returns_none_for_non_json_apology() {
        let raw = "I'm sorry, I cannot help with that request.";
        assert_eq!(extract_json_object(raw), None);
    }

    #[test]
    fn handles_braces_inside_string_values() {
        let raw = r#"{"reason": "contains a } brace"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }
}

//! OpenAI chat-completions provider.
//!
//! Any OpenAI-compatible endpoint works by pointing
//! [`crate::config::DigestConfig::openai_base_url`] at it.

use super::{
    body_preview, classify_status, network_error, parse_retry_after, Completion, Credential,
    PromptRequest, ProviderKind, SummaryProvider,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const KIND: ProviderKind = ProviderKind::OpenAi;

/// Summarises via `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body<'a>(&'a self, prompt: &'a PromptRequest) -> ChatRequest<'a> {
        let reasoning = is_reasoning_model(&self.model);
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: (!reasoning).then_some(self.temperature),
            max_tokens: (!reasoning).then_some(self.max_tokens),
            max_completion_tokens: reasoning.then_some(self.max_tokens),
        }
    }
}

/// o-series and gpt-5 models take `max_completion_tokens` and reject a
/// non-default `temperature`.
fn is_reasoning_model(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();
    let mut chars = name.chars();
    let o_series =
        chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit());
    o_series || name.starts_with("gpt-5")
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &PromptRequest,
        credential: &Credential,
    ) -> Result<Completion, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| network_error(KIND, e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.map_err(|e| network_error(KIND, e))?;

        if !status.is_success() {
            return Err(classify_error(status, retry_after, &body));
        }

        let completion = parse_completion(&body)?;
        debug!(
            "openai {}: {} input tokens, {} output tokens",
            self.model, completion.input_tokens, completion.output_tokens
        );
        Ok(completion)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Read a successful response body.
pub(crate) fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            provider: KIND,
            detail: format!("{e}: {}", body_preview(body)),
        })?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider: KIND,
            detail: "response contained no message content".into(),
        })?;

    let (input_tokens, output_tokens) = parsed
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

/// Classify a non-success response.
///
/// A 429 carrying `insufficient_quota` is a billing problem, not throttling,
/// so it is permanent.
pub(crate) fn classify_error(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = parsed
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body_preview(body));

    let quota_exhausted = parsed.as_ref().is_some_and(|e| {
        e.code.as_deref() == Some("insufficient_quota")
            || e.kind.as_deref() == Some("insufficient_quota")
    });
    if status == StatusCode::TOO_MANY_REQUESTS && quota_exhausted {
        return ProviderError::Api {
            provider: KIND,
            status: Some(status.as_u16()),
            message,
        };
    }

    classify_status(KIND, status, retry_after, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(
            reqwest::Client::new(),
            "https://example.test/v1/",
            DEFAULT_MODEL,
            0.3,
            512,
        )
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(
            provider().endpoint(),
            "https://example.test/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_has_system_then_user() {
        let p = provider();
        let prompt = PromptRequest {
            system: "sys".into(),
            user: "summarise this".into(),
        };
        let json = serde_json::to_value(p.request_body(&prompt)).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "summarise this");
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("max_completion_tokens").is_none());
    }

    #[test]
    fn reasoning_models_use_max_completion_tokens() {
        let p = OpenAiProvider::new(
            reqwest::Client::new(),
            DEFAULT_BASE_URL,
            "o3-mini",
            0.3,
            512,
        );
        let prompt = PromptRequest {
            system: "sys".into(),
            user: "u".into(),
        };
        let json = serde_json::to_value(p.request_body(&prompt)).unwrap();
        assert_eq!(json["max_completion_tokens"], 512);
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn reasoning_model_detection() {
        for m in ["o1", "o3-mini", "o4-mini-2025-04-16", "gpt-5", "openai/o3"] {
            assert!(is_reasoning_model(m), "{m}");
        }
        for m in ["gpt-3.5-turbo", "gpt-4o-mini", "gpt-4.1-nano", "omni-moderation"] {
            assert!(!is_reasoning_model(m), "{m}");
        }
    }

    #[test]
    fn parses_successful_completion() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "  A summary.\n"}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 7}
        }"#;
        let c = parse_completion(body).unwrap();
        assert_eq!(c.text, "  A summary.\n");
        assert_eq!(c.input_tokens, 42);
        assert_eq!(c.output_tokens, 7);
    }

    #[test]
    fn empty_choices_are_malformed() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = parse_completion("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn throttling_429_is_rate_limited() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#;
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, Some(2), body);
        assert_eq!(
            err,
            ProviderError::RateLimited {
                provider: ProviderKind::OpenAi,
                retry_after_secs: Some(2)
            }
        );
    }

    #[test]
    fn quota_429_is_permanent() {
        let body = r#"{"error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}}"#;
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, None, body);
        assert!(!err.is_transient());
        assert!(matches!(err, ProviderError::Api { status: Some(429), .. }));
    }

    #[test]
    fn unauthorized_is_auth_with_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}}"#;
        let err = classify_error(StatusCode::UNAUTHORIZED, None, body);
        match err {
            ProviderError::Auth { detail, .. } => assert!(detail.contains("Incorrect API key")),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_falls_back_to_preview() {
        let err = classify_error(StatusCode::SERVICE_UNAVAILABLE, None, "upstream down");
        match err {
            ProviderError::Api {
                status, message, ..
            } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }
}

//! Google Gemini provider.

use super::{
    body_preview, classify_status, network_error, parse_retry_after, Completion, Credential,
    PromptRequest, ProviderKind, SummaryProvider,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-preview-04-17";

const KIND: ProviderKind = ProviderKind::Gemini;

/// Summarises via `POST {base_url}/v1beta/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiProvider {
    /// `model` may be given with or without the `models/` prefix.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            max_tokens,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/{}:generateContent", self.base_url, self.model)
    }

    fn request_body<'a>(&'a self, prompt: &'a PromptRequest) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl SummaryProvider for GeminiProvider {
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
            .header("x-goog-api-key", credential.expose())
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
            "gemini {}: {} input tokens, {} output tokens",
            self.model, completion.input_tokens, completion.output_tokens
        );
        Ok(completion)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
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
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl ErrorBody {
    fn has_reason(&self, reason: &str) -> bool {
        self.details
            .iter()
            .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some(reason))
    }
}

/// Read a successful response body.
///
/// The summary is the concatenation of every text part of the first
/// candidate. A blocked prompt comes back as 200 with no candidates.
pub(crate) fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            provider: KIND,
            detail: format!("{e}: {}", body_preview(body)),
        })?;

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(ProviderError::Api {
            provider: KIND,
            status: None,
            message: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider: KIND,
            detail: "response contained no candidates".into(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(ProviderError::MalformedResponse {
            provider: KIND,
            detail: format!("candidate has no text (finish reason: {reason})"),
        });
    }

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
    })
}

/// Classify a non-success response.
///
/// Gemini reports an invalid key as 400 `INVALID_ARGUMENT` with reason
/// `API_KEY_INVALID`; throttling is `RESOURCE_EXHAUSTED`.
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

    if let Some(ref err) = parsed {
        if err.has_reason("API_KEY_INVALID") {
            return ProviderError::Auth {
                provider: KIND,
                detail: message,
            };
        }
        if err.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return ProviderError::RateLimited {
                provider: KIND,
                retry_after_secs: retry_after,
            };
        }
    }

    classify_status(KIND, status, retry_after, message)
}

//! Summarisation providers.
//!
//! A provider turns a prompt into a completion. Two implementations exist,
//! [`openai::OpenAiProvider`] and [`gemini::GeminiProvider`], selected by the
//! caller through [`ProviderKind`]; nothing is auto-detected.
//!
//! Providers hold only configuration (endpoint, model, sampling options) and
//! a shared HTTP client. The API key arrives with every call as a
//! [`Credential`], so one provider instance serves any number of users and
//! tests can drive it with throwaway keys.

pub mod gemini;
pub mod openai;

use crate::config::DigestConfig;
use crate::error::{DigestError, ProviderError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which summarisation service to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// Google Gemini `generateContent`.
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Human-facing product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }

    /// Environment variable the CLI reads the key from.
    pub fn key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Error for a request that names this provider but carries no key.
    pub fn missing_credential(&self) -> DigestError {
        DigestError::MissingCredential {
            provider: *self,
            flag: self.as_str(),
            env_var: self.key_env_var(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open-ai" | "gpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            _ => Err(DigestError::UnknownProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// An API key supplied by the caller for one request.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key; blank input yields `None`.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw key, for building the request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// The prompt for a single summarisation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
}

/// A successful completion, untrimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A summarisation backend.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Which service this provider talks to.
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Issue exactly one request. Retrying is the caller's business.
    async fn complete(
        &self,
        prompt: &PromptRequest,
        credential: &Credential,
    ) -> Result<Completion, ProviderError>;
}

/// Build the HTTP client shared by both providers.
pub fn build_http_client(config: &DigestConfig) -> Result<reqwest::Client, DigestError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .user_agent(concat!("deck-digest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DigestError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Instantiate the provider for `kind` from the config.
pub fn create_provider(
    kind: ProviderKind,
    config: &DigestConfig,
    client: reqwest::Client,
) -> Arc<dyn SummaryProvider> {
    match kind {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiProvider::new(
            client,
            &config.openai_base_url,
            &config.openai_model,
            config.temperature,
            config.max_tokens,
        )),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(
            client,
            &config.gemini_base_url,
            &config.gemini_model,
            config.temperature,
            config.max_tokens,
        )),
    }
}

// ── Shared HTTP helpers ──────────────────────────────────────────────────

/// Map a non-success HTTP status to the error taxonomy.
///
/// Provider modules refine this with body-specific rules (quota exhaustion,
/// invalid-key reasons) before falling back here.
pub(crate) fn classify_status(
    provider: ProviderKind,
    status: StatusCode,
    retry_after_secs: Option<u64>,
    message: String,
) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            provider,
            retry_after_secs,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            provider,
            detail: message,
        },
        _ => ProviderError::Api {
            provider,
            status: Some(status.as_u16()),
            message,
        },
    }
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

pub(crate) fn network_error(provider: ProviderKind, err: reqwest::Error) -> ProviderError {
    let detail = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    ProviderError::Network { provider, detail }
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn body_preview(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        let err = "claude".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, DigestError::UnknownProvider { .. }));
    }

    #[test]
    fn provider_kind_serde_matches_as_str() {
        for kind in ProviderKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn credential_rejects_blank_and_hides_key() {
        assert!(Credential::new("   ").is_none());
        let c = Credential::new(" sk-secret ").unwrap();
        assert_eq!(c.expose(), "sk-secret");
        assert!(!format!("{c:?}").contains("secret"));
    }

    #[test]
    fn classify_status_maps_taxonomy() {
        let limited = classify_status(
            ProviderKind::OpenAi,
            StatusCode::TOO_MANY_REQUESTS,
            Some(3),
            "slow down".into(),
        );
        assert_eq!(
            limited,
            ProviderError::RateLimited {
                provider: ProviderKind::OpenAi,
                retry_after_secs: Some(3)
            }
        );

        let auth = classify_status(
            ProviderKind::Gemini,
            StatusCode::UNAUTHORIZED,
            None,
            "bad key".into(),
        );
        assert!(matches!(auth, ProviderError::Auth { .. }));

        let server = classify_status(
            ProviderKind::Gemini,
            StatusCode::BAD_GATEWAY,
            None,
            "upstream".into(),
        );
        assert!(matches!(server, ProviderError::Api { status: Some(502), .. }));
    }

    #[test]
    fn retry_after_reads_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(7));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn body_preview_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let preview = body_preview(&long);
        assert!(preview.chars().count() <= 301);
        assert!(preview.ends_with('\u{2026}'));
        assert_eq!(body_preview("  short  "), "short");
    }
}

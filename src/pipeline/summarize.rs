//! One slide's summarisation call, with the bounded rate-limit retry.
//!
//! ## Retry Strategy
//!
//! Only [`ProviderError::RateLimited`] is retried. The wait is a fixed
//! backoff (raised to the provider's `Retry-After` when that asks for
//! longer, up to [`MAX_RETRY_AFTER`]). After
//! [`RetryPolicy::max_rate_limit_retries`] extra attempts the rate limit
//! is final. Everything else (auth, quota, 5xx, network, malformed body)
//! fails on the first attempt.

use crate::config::DigestConfig;
use crate::error::ProviderError;
use crate::output::{SlideStatus, NO_TEXT_PLACEHOLDER};
use crate::pipeline::postprocess::clean_summary;
use crate::prompts::build_user_prompt;
use crate::provider::{Credential, PromptRequest, SummaryProvider};
use crate::style::SummaryStyle;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Cap on how long a `Retry-After` header may stretch the backoff.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bounded retry on rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after a rate limit.
    pub max_rate_limit_retries: u32,
    /// Fixed wait before each retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            max_rate_limit_retries: config.max_rate_limit_retries,
            backoff: Duration::from_millis(config.rate_limit_backoff_ms),
        }
    }

    fn wait_for(&self, err: &ProviderError) -> Duration {
        match err {
            ProviderError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => self
                .backoff
                .max(Duration::from_secs(*secs).min(MAX_RETRY_AFTER)),
            _ => self.backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 1,
            backoff: Duration::from_secs(5),
        }
    }
}

/// How the call for one slide ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// The trimmed summary, or [`NO_TEXT_PLACEHOLDER`]. Empty on failure;
    /// the caller substitutes the error placeholder.
    pub summary: String,
    pub status: SlideStatus,
    /// Provider calls made.
    pub attempts: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// The last error, when `status` is `Failed`.
    pub error: Option<ProviderError>,
}

/// Summarise one slide's text.
///
/// Whitespace-only text short-circuits to the no-text placeholder without
/// calling the provider.
pub async fn summarize(
    provider: &dyn SummaryProvider,
    text: &str,
    style: SummaryStyle,
    credential: &Credential,
    policy: &RetryPolicy,
    system_prompt: &str,
) -> SummaryOutcome {
    if text.trim().is_empty() {
        return SummaryOutcome {
            summary: NO_TEXT_PLACEHOLDER.to_string(),
            status: SlideStatus::NoText,
            attempts: 0,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
        };
    }

    let prompt = PromptRequest {
        system: system_prompt.to_string(),
        user: build_user_prompt(text, style),
    };

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match provider.complete(&prompt, credential).await {
            Ok(completion) => {
                let summary = clean_summary(&completion.text);
                if summary.is_empty() {
                    return failed(
                        ProviderError::MalformedResponse {
                            provider: provider.kind(),
                            detail: "empty summary".into(),
                        },
                        attempts,
                    );
                }
                debug!(
                    "{}: summary of {} chars after {} attempt(s)",
                    provider.kind(),
                    summary.len(),
                    attempts
                );
                return SummaryOutcome {
                    summary,
                    status: SlideStatus::Summarized,
                    attempts,
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                    error: None,
                };
            }
            Err(e) if e.is_transient() && attempts <= policy.max_rate_limit_retries => {
                let wait = policy.wait_for(&e);
                warn!(
                    "{e}; retry {}/{} in {}ms",
                    attempts,
                    policy.max_rate_limit_retries,
                    wait.as_millis()
                );
                sleep(wait).await;
            }
            Err(e) => {
                warn!("{e} (attempt {attempts}, giving up)");
                return failed(e, attempts);
            }
        }
    }
}

fn failed(error: ProviderError, attempts: u32) -> SummaryOutcome {
    SummaryOutcome {
        summary: String::new(),
        status: SlideStatus::Failed,
        attempts,
        input_tokens: 0,
        output_tokens: 0,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, ProviderKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<Completion, ProviderError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Completion, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SummaryProvider for Scripted {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            prompt: &PromptRequest,
            _credential: &Credential,
        ) -> Result<Completion, ProviderError> {
            self.calls.lock().unwrap().push(prompt.user.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ok("fallback")))
        }
    }

    fn ok(text: &str) -> Completion {
        Completion {
            text: text.into(),
            input_tokens: 10,
            output_tokens: 3,
        }
    }

    fn limited() -> ProviderError {
        ProviderError::RateLimited {
            provider: ProviderKind::OpenAi,
            retry_after_secs: None,
        }
    }

    fn instant() -> RetryPolicy {
        RetryPolicy {
            max_rate_limit_retries: 1,
            backoff: Duration::ZERO,
        }
    }

    fn key() -> Credential {
        Credential::new("sk-test").unwrap()
    }

    #[tokio::test]
    async fn blank_text_makes_no_call() {
        let p = Scripted::new(vec![]);
        let out = summarize(&p, " \n\t", SummaryStyle::Concise, &key(), &instant(), "sys").await;
        assert_eq!(out.summary, NO_TEXT_PLACEHOLDER);
        assert_eq!(out.status, SlideStatus::NoText);
        assert_eq!(out.attempts, 0);
        assert_eq!(p.calls(), 0);
    }

    #[tokio::test]
    async fn success_is_trimmed() {
        let p = Scripted::new(vec![Ok(ok("  Sales doubled.\n"))]);
        let out = summarize(&p, "Sales", SummaryStyle::Detailed, &key(), &instant(), "sys").await;
        assert_eq!(out.summary, "Sales doubled.");
        assert_eq!(out.status, SlideStatus::Summarized);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.input_tokens, 10);
    }

    #[tokio::test]
    async fn rate_limit_then_success_takes_two_calls() {
        let p = Scripted::new(vec![Err(limited()), Ok(ok("Recovered"))]);
        let out = summarize(&p, "text", SummaryStyle::Concise, &key(), &instant(), "sys").await;
        assert_eq!(out.status, SlideStatus::Summarized);
        assert_eq!(out.attempts, 2);
        assert_eq!(p.calls(), 2);
    }

    #[tokio::test]
    async fn rate_limit_twice_fails_after_two_calls() {
        let p = Scripted::new(vec![Err(limited()), Err(limited()), Ok(ok("too late"))]);
        let out = summarize(&p, "text", SummaryStyle::Concise, &key(), &instant(), "sys").await;
        assert_eq!(out.status, SlideStatus::Failed);
        assert_eq!(out.attempts, 2);
        assert_eq!(p.calls(), 2);
        assert_eq!(out.error, Some(limited()));
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let p = Scripted::new(vec![Err(ProviderError::Auth {
            provider: ProviderKind::OpenAi,
            detail: "bad key".into(),
        })]);
        let out = summarize(&p, "text", SummaryStyle::Concise, &key(), &instant(), "sys").await;
        assert_eq!(out.status, SlideStatus::Failed);
        assert_eq!(p.calls(), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_single_call() {
        let p = Scripted::new(vec![Err(limited()), Ok(ok("unused"))]);
        let policy = RetryPolicy {
            max_rate_limit_retries: 0,
            backoff: Duration::ZERO,
        };
        let out = summarize(&p, "text", SummaryStyle::Concise, &key(), &policy, "sys").await;
        assert_eq!(out.status, SlideStatus::Failed);
        assert_eq!(p.calls(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_failure() {
        let p = Scripted::new(vec![Ok(ok("   "))]);
        let out = summarize(&p, "text", SummaryStyle::Concise, &key(), &instant(), "sys").await;
        assert_eq!(out.status, SlideStatus::Failed);
        assert!(matches!(
            out.error,
            Some(ProviderError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn prompt_carries_style_instruction() {
        let p = Scripted::new(vec![Ok(ok("x"))]);
        summarize(&p, "Q3 numbers", SummaryStyle::BulletPoints, &key(), &instant(), "sys").await;
        let sent = p.calls.lock().unwrap()[0].clone();
        assert!(sent.contains(SummaryStyle::BulletPoints.instruction()));
        assert!(sent.ends_with("Q3 numbers"));
    }

    #[test]
    fn retry_after_extends_backoff_up_to_cap() {
        let policy = RetryPolicy {
            max_rate_limit_retries: 1,
            backoff: Duration::from_secs(5),
        };
        let short = ProviderError::RateLimited {
            provider: ProviderKind::Gemini,
            retry_after_secs: Some(2),
        };
        let long = ProviderError::RateLimited {
            provider: ProviderKind::Gemini,
            retry_after_secs: Some(3600),
        };
        assert_eq!(policy.wait_for(&short), Duration::from_secs(5));
        assert_eq!(policy.wait_for(&long), MAX_RETRY_AFTER);
    }
}

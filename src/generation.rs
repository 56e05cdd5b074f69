//! The content-generation contract and its resilience wrapper.
//!
//! Everything downstream of the page source talks to the model through the
//! [`ContentGenerator`] trait: one request in, one [`GenerationResponse`] out.
//! A response is either text or a typed failure, never an `Err`, so callers
//! handle service failures as ordinary values.
//!
//! [`ResilientGenerator`] decorates any generator with a per-attempt timeout
//! and exponential-backoff retries for transient failures. The pipeline
//! always wraps its client in one, so no call can hang.

use crate::document::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Model identity and sampling budget for one kind of call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Model for this call site. The provider is built for it; `None` falls
    /// back to `ArticleConfig::model`.
    pub model: Option<String>,
    /// Upper bound on generated tokens.
    pub max_output_tokens: usize,
    /// Sampling temperature, 0.0–2.0.
    pub temperature: f32,
}

impl GenerationParameters {
    /// Defaults for a single-slide explanation.
    pub fn page_analysis() -> Self {
        Self {
            model: None,
            max_output_tokens: 1000,
            temperature: 0.3,
        }
    }

    /// Defaults for whole-article synthesis.
    pub fn synthesis() -> Self {
        Self {
            model: None,
            max_output_tokens: 8000,
            temperature: 0.5,
        }
    }
}

/// A single call to the content-generation service.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Optional image attachment. `None` makes the call text-only.
    pub image: Option<PageImage>,
    pub parameters: GenerationParameters,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>, parameters: GenerationParameters) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            parameters,
        }
    }

    pub fn with_image(mut self, image: PageImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Token accounting reported by the service, zero when unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Why a generation call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// HTTP 429 or a provider quota message.
    RateLimited,
    /// The request was rejected (bad image, context too long, …).
    InvalidInput,
    /// 5xx, overloaded backend, connection failure.
    ServiceUnavailable,
    /// The call exceeded its time bound.
    Timeout,
    /// Anything else, including empty or malformed responses.
    Unknown,
}

impl FailureKind {
    /// Whether another attempt has a reasonable chance of succeeding.
    ///
    /// Malformed responses (`Unknown`) are terminal.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::ServiceUnavailable | FailureKind::Timeout
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::InvalidInput => "invalid input",
            FailureKind::ServiceUnavailable => "service unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResponse {
    Success { text: String, usage: TokenUsage },
    Failure { kind: FailureKind, message: String },
}

impl GenerationResponse {
    pub fn success(text: impl Into<String>) -> Self {
        GenerationResponse::Success {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        GenerationResponse::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResponse::Success { .. })
    }
}

/// A multimodal or text-only generation service.
///
/// Implementations must not panic on service errors; every failure is a
/// [`GenerationResponse::Failure`].
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> GenerationResponse;
}

/// Timeout and retry policy applied around every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Bound on each individual attempt.
    pub timeout: Duration,
    /// Extra attempts after the first, for retryable failures only.
    pub max_retries: u32,
    /// Initial backoff; doubles after each retry.
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Wraps a generator with a time bound and retries.
///
/// A timed-out attempt becomes `Failure { kind: Timeout }`; the inner future
/// is dropped, so a hung connection cannot stall the run.
pub struct ResilientGenerator<G: ?Sized> {
    policy: CallPolicy,
    inner: std::sync::Arc<G>,
}

impl<G: ContentGenerator + ?Sized> ResilientGenerator<G> {
    pub fn new(inner: std::sync::Arc<G>, policy: CallPolicy) -> Self {
        Self { policy, inner }
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }
}

#[async_trait]
impl<G: ContentGenerator + ?Sized> ContentGenerator for ResilientGenerator<G> {
    async fn generate(&self, request: GenerationRequest) -> GenerationResponse {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let backoff = self.policy.backoff * 2u32.saturating_pow(attempt - 1);
                warn!(
                    "Generation retry {}/{} after {:?}",
                    attempt, self.policy.max_retries, backoff
                );
                sleep(backoff).await;
            }

            let response = match timeout(self.policy.timeout, self.inner.generate(request.clone()))
                .await
            {
                Ok(response) => response,
                Err(_) => GenerationResponse::failure(
                    FailureKind::Timeout,
                    format!("call timed out after {:?}", self.policy.timeout),
                ),
            };

            match &response {
                GenerationResponse::Success { .. } => {
                    debug!("Generation succeeded on attempt {}", attempt + 1);
                    return response;
                }
                GenerationResponse::Failure { kind, message } => {
                    warn!("Generation attempt {} failed ({}): {}", attempt + 1, kind, message);
                    if !kind.is_retryable() || attempt >= self.policy.max_retries {
                        return response;
                    }
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays a fixed list of responses, then repeats the last one.
    struct Scripted {
        responses: Mutex<Vec<GenerationResponse>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(responses: Vec<GenerationResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for Scripted {
        async fn generate(&self, _request: GenerationRequest) -> GenerationResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl ContentGenerator for Hangs {
        async fn generate(&self, _request: GenerationRequest) -> GenerationResponse {
            sleep(Duration::from_secs(3600)).await;
            GenerationResponse::success("never")
        }
    }

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::text("hi", GenerationParameters::page_analysis())
    }

    #[test]
    fn retryable_kinds() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::ServiceUnavailable.is_retryable());
        assert!(FailureKind::Timeout.is_retryable());
        assert!(!FailureKind::InvalidInput.is_retryable());
        assert!(!FailureKind::Unknown.is_retryable());
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let inner = Scripted::new(vec![
            GenerationResponse::failure(FailureKind::RateLimited, "429"),
            GenerationResponse::success("done"),
        ]);
        let gen = ResilientGenerator::new(Arc::clone(&inner), fast_policy(2));
        let response = gen.generate(request()).await;
        assert_eq!(response, GenerationResponse::success("done"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let inner = Scripted::new(vec![GenerationResponse::failure(
            FailureKind::Unknown,
            "empty choices",
        )]);
        let gen = ResilientGenerator::new(Arc::clone(&inner), fast_policy(3));
        let response = gen.generate(request()).await;
        assert!(!response.is_success());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let inner = Scripted::new(vec![GenerationResponse::failure(
            FailureKind::ServiceUnavailable,
            "503",
        )]);
        let gen = ResilientGenerator::new(Arc::clone(&inner), fast_policy(2));
        let response = gen.generate(request()).await;
        assert!(matches!(
            response,
            GenerationResponse::Failure {
                kind: FailureKind::ServiceUnavailable,
                ..
            }
        ));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hung_call_becomes_timeout_failure() {
        let gen = ResilientGenerator::new(Arc::new(Hangs), fast_policy(0));
        let response = gen.generate(request()).await;
        match response {
            GenerationResponse::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Timeout);
                assert!(message.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}

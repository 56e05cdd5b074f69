//! [`ContentGenerator`] backed by an edgequake-llm provider.
//!
//! The adapter is deliberately thin: one request becomes one chat message
//! (text plus optional image), one provider call, one response. Timeouts and
//! retries are layered on top by [`crate::generation::ResilientGenerator`].
//!
//! Provider errors arrive as opaque `LlmError` values whose wording differs
//! per vendor, so [`classify_error`] maps the message onto a
//! [`FailureKind`] by the status codes and phrases providers use.

use crate::generation::{
    ContentGenerator, FailureKind, GenerationParameters, GenerationRequest, GenerationResponse,
    TokenUsage,
};
use crate::pipeline::encode::to_image_data;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Sends generation requests to one edgequake-llm provider.
pub struct LlmGenerationClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmGenerationClient {
    /// `label` names the provider/model pair in logs.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> GenerationResponse {
        let start = Instant::now();
        let message = match request.image {
            Some(ref image) => {
                ChatMessage::user_with_images(request.prompt.as_str(), vec![to_image_data(image)])
            }
            None => ChatMessage::user(request.prompt.as_str()),
        };
        let options = build_options(&request.parameters);

        match self.provider.chat(&[message], Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                if response.content.trim().is_empty() {
                    return GenerationResponse::failure(
                        FailureKind::Unknown,
                        format!("{} returned an empty response", self.label),
                    );
                }
                GenerationResponse::Success {
                    text: response.content,
                    usage: TokenUsage {
                        input_tokens: response.prompt_tokens as usize,
                        output_tokens: response.completion_tokens as usize,
                    },
                }
            }
            Err(e) => {
                let message = e.to_string();
                GenerationResponse::failure(classify_error(&message), message)
            }
        }
    }
}

/// Build `CompletionOptions` from generation parameters.
fn build_options(params: &GenerationParameters) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(params.temperature),
        max_tokens: Some(params.max_output_tokens),
        ..Default::default()
    }
}

/// Map a provider error message to a failure kind.
pub fn classify_error(message: &str) -> FailureKind {
    let m = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

    if has(&["429", "rate limit", "rate_limit", "too many requests", "quota"]) {
        FailureKind::RateLimited
    } else if has(&["timed out", "timeout", "deadline"]) {
        FailureKind::Timeout
    } else if has(&[
        "500",
        "502",
        "503",
        "504",
        "unavailable",
        "overloaded",
        "connection",
        "network",
    ]) {
        FailureKind::ServiceUnavailable
    } else if has(&[
        "400",
        "invalid",
        "bad request",
        "context length",
        "too large",
        "content_filter",
        "unsupported",
    ]) {
        FailureKind::InvalidInput
    } else {
        FailureKind::Unknown
    }
}

//! The prompted-text-to-JSON LLM client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::json::{parse_json_array_lenient, parse_json_object_lenient};
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryConfig};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transient LLM error: {0}")]
    Transient(String),
    #[error("LLM request was cancelled")]
    Cancelled,
    #[error("LLM response could not be parsed as JSON: {0}")]
    Parse(String),
    #[error("LLM returned a permanent error: {0}")]
    Permanent(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

/// The shape of a chat-completion call any concrete backend must expose.
/// Mirrors the OpenAI-compatible chat completions contract closely enough
/// that the same trait object can front OpenAI, a local gateway, or a mock.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Generates a completion and parses it against a caller-chosen shape,
/// rate-limited and retried. The expected shape is named up front as a
/// `ResponseShape` so the right lenient-parse strategy (array vs object)
/// is used for recovery.
pub struct LlmClient<P: LlmProvider> {
    provider: P,
    rate_limiter: RateLimiter,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    JsonArray,
    JsonObject,
}

impl<P: LlmProvider> LlmClient<P> {
    pub fn new(provider: P, rate_delay: Duration, retry_config: RetryConfig) -> Self {
        Self {
            provider,
            rate_limiter: RateLimiter::new(rate_delay),
            retry_config,
        }
    }

    /// Sends `prompt`, retrying transient failures, then parses the
    /// response per `shape`, falling back to regex-based recovery on parse
    /// failure.
    #[instrument(skip(self, prompt), fields(shape = ?shape))]
    pub async fn generate(&self, prompt: &str, shape: ResponseShape) -> Result<Value, LlmError> {
        self.rate_limiter.wait_if_needed().await;

        let raw = retry_with_backoff(
            || self.provider.complete(prompt),
            &self.retry_config,
            LlmError::is_retryable,
        )
        .await?;

        let parsed = match shape {
            ResponseShape::JsonArray => parse_json_array_lenient(&raw),
            ResponseShape::JsonObject => parse_json_object_lenient(&raw),
        };

        parsed.ok_or_else(|| {
            warn!(response = %raw, "LLM response was not recoverable JSON");
            LlmError::Parse(raw)
        })
    }
}

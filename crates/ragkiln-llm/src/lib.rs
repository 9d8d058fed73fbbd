//! Rate-limited, retrying LLM and embedding clients.
//!
//! Both providers share the same state machine: `ready -> waiting(rate) ->
//! in-flight -> (success | retryable-error -> waiting(backoff) -> in-flight
//! | permanent-error)`. That shared shape lives in [`rate_limit`] and
//! [`retry`]; [`chat`] and [`embeddings`] are the two concrete clients.

pub mod chat;
pub mod embeddings;
pub mod json;
pub mod openai;
pub mod rate_limit;
pub mod retry;

#[cfg(feature = "test-utils")]
pub mod mock;

pub use chat::{LlmClient, LlmError, LlmProvider};
pub use embeddings::{EmbeddingClient, EmbeddingError, EmbeddingProvider};
pub use openai::{OpenAiChatProvider, OpenAiEmbeddingProvider};
pub use rate_limit::RateLimiter;
pub use retry::{retry_with_backoff, RetryConfig};

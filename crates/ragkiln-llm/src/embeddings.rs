//! The batched text -> 768-dim vector client.

use std::time::Duration;

use async_trait::async_trait;
use ragkiln_core::{Embedding, EMBEDDING_DIM};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryConfig};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("transient embedding error: {0}")]
    Transient(String),
    #[error("embedding request was cancelled")]
    Cancelled,
    #[error("embedding provider returned {0} dimensions, expected {EMBEDDING_DIM}")]
    WrongDimension(usize),
    #[error("embedding batch too large: {0} texts, max 100")]
    BatchTooLarge(usize),
    #[error("permanent embedding error: {0}")]
    Permanent(String),
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

pub const MAX_BATCH_SIZE: usize = 100;

/// What a concrete embedding backend must expose: one round-trip producing
/// one flat vector per input text, in order, possibly with per-text
/// failures represented as `None` rather than failing the whole batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch_raw(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError>;
}

pub struct EmbeddingClient<P: EmbeddingProvider> {
    provider: P,
    rate_limiter: RateLimiter,
    retry_config: RetryConfig,
}

impl<P: EmbeddingProvider> EmbeddingClient<P> {
    pub fn new(provider: P, rate_delay: Duration, retry_config: RetryConfig) -> Self {
        Self {
            provider,
            rate_limiter: RateLimiter::new(rate_delay),
            retry_config,
        }
    }

    /// Embeds a single text.
    pub async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let texts = [text.to_string()];
        let results = self.embed_batch(&texts).await?;
        results
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| EmbeddingError::Permanent("provider returned no embedding".into()))
    }

    /// `EmbedBatch(texts[<=100]) -> [[float;768]]`. On whole-batch failure,
    /// transparently falls back to embedding each text individually,
    /// returning `None` for any text that still fails.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, EmbeddingError> {
        if texts.len() > MAX_BATCH_SIZE {
            return Err(EmbeddingError::BatchTooLarge(texts.len()));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.rate_limiter.wait_if_needed().await;

        let batch_result = retry_with_backoff(
            || self.provider.embed_batch_raw(texts),
            &self.retry_config,
            EmbeddingError::is_retryable,
        )
        .await;

        match batch_result {
            Ok(raw_vectors) => self.normalize_batch(raw_vectors),
            Err(error) => {
                warn!(?error, "embedding batch failed, falling back to per-text calls");
                self.embed_one_at_a_time(texts).await
            }
        }
    }

    fn normalize_batch(
        &self,
        raw_vectors: Vec<Option<Vec<f32>>>,
    ) -> Result<Vec<Option<Embedding>>, EmbeddingError> {
        Ok(raw_vectors
            .into_iter()
            .map(|maybe_vec| maybe_vec.and_then(|v| Embedding::try_from(v).ok()))
            .collect())
    }

    async fn embed_one_at_a_time(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Embedding>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            self.rate_limiter.wait_if_needed().await;
            let single = [text.clone()];
            let result = retry_with_backoff(
                || self.provider.embed_batch_raw(&single),
                &self.retry_config,
                EmbeddingError::is_retryable,
            )
            .await;
            match result {
                Ok(mut vectors) if !vectors.is_empty() => {
                    let embedding = vectors.remove(0).and_then(|v| Embedding::try_from(v).ok());
                    out.push(embedding);
                }
                _ => out.push(None),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct ScriptedProvider {
        batch_calls: Arc<AtomicU32>,
        fail_batch: bool,
        per_text_failure_index: Option<usize>,
        call_log: Arc<AsyncMutex<Vec<usize>>>,
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        async fn embed_batch_raw(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            self.call_log.lock().await.push(texts.len());
            if texts.len() > 1 && self.fail_batch {
                self.batch_calls.fetch_add(1, Ordering::SeqCst);
                return Err(EmbeddingError::Transient("simulated batch failure".into()));
            }
            let results = texts
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    if Some(i) == self.per_text_failure_index && texts.len() == 1 {
                        None
                    } else {
                        Some(vec![0.1f32; EMBEDDING_DIM])
                    }
                })
                .collect();
            Ok(results)
        }
    }

    fn fast_client(provider: ScriptedProvider) -> EmbeddingClient<ScriptedProvider> {
        let retry_config = RetryConfig {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
        };
        EmbeddingClient::new(provider, Duration::ZERO, retry_config)
    }

    #[tokio::test]
    async fn embeds_a_batch_in_one_call() {
        let provider = ScriptedProvider {
            batch_calls: Arc::new(AtomicU32::new(0)),
            fail_batch: false,
            per_text_failure_index: None,
            call_log: Arc::new(AsyncMutex::new(Vec::new())),
        };
        let client = fast_client(provider);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = client.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn batch_failure_falls_back_to_per_text_calls() {
        let call_log = Arc::new(AsyncMutex::new(Vec::new()));
        let provider = ScriptedProvider {
            batch_calls: Arc::new(AtomicU32::new(0)),
            fail_batch: true,
            per_text_failure_index: None,
            call_log: call_log.clone(),
        };
        let client = fast_client(provider);
        let texts = vec!["a".to_string(), "b".to_string()];
        let results = client.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Option::is_some));
        // First call was the failed batch call (size 2), then two size-1 calls.
        let log = call_log.lock().await;
        assert_eq!(*log, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn batch_larger_than_max_is_rejected() {
        let provider = ScriptedProvider {
            batch_calls: Arc::new(AtomicU32::new(0)),
            fail_batch: false,
            per_text_failure_index: None,
            call_log: Arc::new(AsyncMutex::new(Vec::new())),
        };
        let client = fast_client(provider);
        let texts = vec!["x".to_string(); MAX_BATCH_SIZE + 1];
        let err = client.embed_batch(&texts).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::BatchTooLarge(101)));
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_without_a_call() {
        let provider = ScriptedProvider {
            batch_calls: Arc::new(AtomicU32::new(0)),
            fail_batch: false,
            per_text_failure_index: None,
            call_log: Arc::new(AsyncMutex::new(Vec::new())),
        };
        let client = fast_client(provider);
        let results = client.embed_batch(&[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn single_embed_returns_one_vector() {
        let provider = ScriptedProvider {
            batch_calls: Arc::new(AtomicU32::new(0)),
            fail_batch: false,
            per_text_failure_index: None,
            call_log: Arc::new(AsyncMutex::new(Vec::new())),
        };
        let client = fast_client(provider);
        let embedding = client.embed("hello").await.unwrap();
        assert_eq!(embedding.as_slice().len(), EMBEDDING_DIM);
    }
}

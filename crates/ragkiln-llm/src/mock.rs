//! Scriptable mock providers for downstream crates' tests. Gated behind
//! the `test-utils` feature so production builds never link test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragkiln_core::EMBEDDING_DIM;

use crate::chat::LlmError;
use crate::embeddings::EmbeddingError;
use crate::{EmbeddingProvider, LlmProvider};

/// Returns a fixed queue of responses in order, repeating the last one once
/// exhausted, and records every prompt it was called with.
#[derive(Clone)]
pub struct MockLlmProvider {
    responses: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            call_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().unwrap();
        let response = responses
            .get(index)
            .or_else(|| responses.last())
            .cloned()
            .ok_or_else(|| LlmError::Permanent("mock has no configured responses".into()))?;
        Ok(response)
    }
}

/// Produces a deterministic embedding for each distinct input text (same
/// text always yields the same vector), so tests can construct documents
/// with known similarity relationships.
#[derive(Clone, Default)]
pub struct MockEmbeddingProvider {
    call_count: Arc<AtomicUsize>,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Deterministic hash-seeded vector: same text -> same vector, distinct
    /// texts -> (almost certainly) distinct vectors.
    pub fn deterministic_vector(text: &str) -> Vec<f32> {
        let hash = blake3::hash(text.as_bytes());
        let bytes = hash.as_bytes();
        (0..EMBEDDING_DIM)
            .map(|i| {
                let b = bytes[i % bytes.len()];
                (b as f32 / 255.0) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch_raw(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Some(Self::deterministic_vector(t)))
            .collect())
    }
}

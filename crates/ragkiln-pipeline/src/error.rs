//! Per-stage error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("crawl produced zero pages")]
    EmptyCrawl,
    #[error("topic extraction input invalid: {0}")]
    ExtractionInput(String),
    #[error(transparent)]
    Llm(#[from] ragkiln_llm::LlmError),
    #[error(transparent)]
    Embedding(#[from] ragkiln_llm::EmbeddingError),
    #[error(transparent)]
    Store(#[from] ragkiln_store::StoreError),
    #[error("id generation exhausted {0} attempts")]
    IdGenerationExhausted(u32),
    #[error("document {0} not found for merge")]
    MergeTargetMissing(String),
}

impl PipelineError {
    /// Whether retrying this error at the orchestrator level could help.
    /// Transient provider errors are already retried inside the failing
    /// client; by the time they surface here they are either a permanent
    /// client error or a store error.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Llm(e) => e.is_retryable(),
            PipelineError::Embedding(e) => e.is_retryable(),
            PipelineError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

//! The store's typed error surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to acquire a pooled connection: {0}")]
    Pool(String),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("document {0} not found")]
    NotFound(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("stored embedding for {0} has the wrong dimension")]
    CorruptEmbedding(String),
}

impl StoreError {
    /// Connection-pool exhaustion and deadlocks are retryable by the
    /// caller; constraint violations and not-found
    /// are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Pool(_))
    }
}

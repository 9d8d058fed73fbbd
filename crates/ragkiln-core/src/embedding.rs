//! The fixed-dimension embedding type shared by documents, chunks, and topics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every embedding in this system is a flat 768-float vector.
///
/// Flatness is a testable property: on-wire shapes that
/// arrive as `[[f32]]` must be flattened one level before they ever reach
/// this type, never stored nested.
pub const EMBEDDING_DIM: usize = 768;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("expected {EMBEDDING_DIM} dimensions, got {0}")]
    WrongDimension(usize),
}

/// A validated, flat 768-dimensional embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        if values.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::WrongDimension(values.len()));
        }
        Ok(Self(values))
    }
}

impl std::ops::Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `dot(a, b) / (||a|| * ||b||)`, computed over two 768-dim vectors.
///
/// Returns `0.0` if either vector has zero norm, so that a degenerate stored
/// embedding never produces NaN and silently wins a similarity comparison.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.as_slice().iter().zip(b.as_slice().iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

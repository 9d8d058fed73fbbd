//! Shared domain types and provider traits for the ragkiln ingestion pipeline.
//!
//! This crate defines the vocabulary every other crate in the workspace
//! builds on: `Document`, `Chunk`, `Topic`, `MergeRecord`, the `Embedding`
//! newtype, the run-report shapes, and the `Crawler` boundary trait. It has
//! no dependency on any concrete storage or HTTP client so that higher-level
//! crates can depend on it without pulling in `sqlx` or `reqwest`.

pub mod crawl;
pub mod decision;
pub mod embedding;
pub mod model;
pub mod report;

pub use crawl::{CrawlError, CrawlOutput, Crawler, CrawledPage};
pub use decision::Decision;
pub use embedding::{cosine_similarity, Embedding, EmbeddingError, EMBEDDING_DIM};
pub use model::{Chunk, Document, MergeRecord, MergeStrategy, Topic};
pub use report::{DecisionCounts, RunError, RunReport, StageStatus};

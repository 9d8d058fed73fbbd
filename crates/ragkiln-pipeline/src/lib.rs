//! The orchestrator, merge-decision engine, and document creator/merger.
//!
//! This crate depends on `ragkiln-store` for the concrete Postgres
//! backend but talks to it only through [`store_backend::StoreBackend`],
//! so the full pipeline is exercisable against an in-process test double
//! without a live database.

pub mod creator;
pub mod decider;
pub mod error;
pub mod extractor;
pub mod levenshtein;
pub mod merger;
pub mod orchestrator;
pub mod store_backend;

pub use creator::{create_document, CreateResult};
pub use decider::{decide, DecisionOutcome, MergeThresholds, VerifyCache};
pub use error::PipelineError;
pub use extractor::{extract_topics, ExtractorConfig};
pub use merger::{merge_document, MergeResult};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use store_backend::StoreBackend;

//! Persisted and transient domain entities.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;

/// A canonical knowledge artifact. Owned exclusively by the store; created
/// by `DocumentCreator`, mutated only by `DocumentMerger`, never deleted by
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub keywords: BTreeSet<String>,
    pub source_urls: BTreeSet<String>,
    /// `None` only transiently before the first embed; once persisted via
    /// DocumentCreator every document has one.
    pub embedding: Option<Embedding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// The template used for both topic-side and document-side embedding
    /// input. Both sides must share the same template, or cosine similarity
    /// between a topic's and a document's embeddings is meaningless.
    pub fn embedding_text(&self) -> String {
        embedding_template(&self.title, &self.summary, &self.content)
    }
}

/// `"{title}. {summary}"`, falling back to a content prefix only when
/// `summary` is empty. Shared by `Document` and `Topic` so the two sides of
/// a merge decision can never diverge.
pub fn embedding_template(title: &str, summary: &str, content: &str) -> String {
    const CONTENT_FALLBACK_CHARS: usize = 500;
    if summary.trim().is_empty() {
        let prefix: String = content.chars().take(CONTENT_FALLBACK_CHARS).collect();
        format!("{title}. {prefix}")
    } else {
        format!("{title}. {summary}")
    }
}

/// A retrieval-sized fragment of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub position: u32,
    pub content: String,
    pub token_count: u32,
    pub embedding: Embedding,
}

/// Append-only audit row written inside the merge transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
    pub id: i64,
    pub target_doc_id: String,
    pub source_topic_title: String,
    pub strategy: MergeStrategy,
    pub changes_made: String,
    pub merged_at: DateTime<Utc>,
}

/// The merge strategy is a closed, two-variant sum type chosen by the LLM
/// rewrite call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Topic addresses an existing section; detail is folded in.
    Enrich,
    /// Topic introduces a new section; it is appended.
    Expand,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::Enrich => write!(f, "enrich"),
            MergeStrategy::Expand => write!(f, "expand"),
        }
    }
}

/// A transient, LLM-extracted unit derived from a crawled page.
/// Never persisted directly; owned by the orchestrator until dispatched to
/// `DocumentCreator`/`DocumentMerger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub keywords: BTreeSet<String>,
    pub category: String,
    pub source_url: String,
    /// Computed lazily by the merge decider and cached there; not set by
    /// `TopicExtractor`.
    pub embedding: Option<Embedding>,
}

impl Topic {
    pub fn embedding_text(&self) -> String {
        embedding_template(&self.title, &self.summary, &self.content)
    }

    /// Normalized title used for intra-batch dedup and cross-topic
    /// verify-dedup: lowercase, whitespace collapsed.
    pub fn normalized_title(&self) -> String {
        self.title
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

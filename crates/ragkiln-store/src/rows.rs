//! Row <-> domain-type conversion. Kept separate from the query logic in
//! `store.rs` so the SQL shape and the Rust shape can be read side by side.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use pgvector::Vector;
use ragkiln_core::{Chunk, Document, Embedding, MergeRecord, MergeStrategy};
use sqlx::FromRow;

use crate::error::StoreError;

#[derive(FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub source_urls: Vec<String>,
    pub embedding: Option<Vector>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn into_document(self) -> Result<Document, StoreError> {
        let embedding = match self.embedding {
            Some(v) => Some(
                Embedding::try_from(v.to_vec())
                    .map_err(|_| StoreError::CorruptEmbedding(self.id.clone()))?,
            ),
            None => None,
        };
        Ok(Document {
            id: self.id,
            title: self.title,
            summary: self.summary,
            content: self.content,
            category: self.category,
            keywords: self.keywords.into_iter().collect::<BTreeSet<_>>(),
            source_urls: self.source_urls.into_iter().collect::<BTreeSet<_>>(),
            embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// The row shape returned by `GetAll`: document metadata plus the
/// aggregate chunk stats computed by the `LEFT JOIN`.
#[derive(FromRow)]
pub struct DocumentSummaryRow {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub source_urls: Vec<String>,
    pub embedding: Option<Vector>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chunk_count: i64,
    pub content_length: i64,
}

/// Lightweight projection of a document used by `MergeDecider`: exactly the
/// fields needed for the similarity scan plus the two read-only stats
/// `GetAll`'s join computes, without paying to load full `content`.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub keywords: BTreeSet<String>,
    pub source_urls: BTreeSet<String>,
    pub embedding: Option<Embedding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chunk_count: i64,
    pub content_length: i64,
}

impl DocumentSummaryRow {
    pub fn into_summary(self) -> Result<DocumentSummary, StoreError> {
        let embedding = match self.embedding {
            Some(v) => Some(
                Embedding::try_from(v.to_vec())
                    .map_err(|_| StoreError::CorruptEmbedding(self.id.clone()))?,
            ),
            None => None,
        };
        Ok(DocumentSummary {
            id: self.id,
            title: self.title,
            summary: self.summary,
            category: self.category,
            keywords: self.keywords.into_iter().collect(),
            source_urls: self.source_urls.into_iter().collect(),
            embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
            chunk_count: self.chunk_count,
            content_length: self.content_length,
        })
    }
}

#[derive(FromRow)]
pub struct ChunkRow {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub embedding: Vector,
    pub chunk_index: i32,
    pub token_count: i32,
}

impl ChunkRow {
    pub fn into_chunk(self) -> Result<Chunk, StoreError> {
        let embedding = Embedding::try_from(self.embedding.to_vec())
            .map_err(|_| StoreError::CorruptEmbedding(self.id.clone()))?;
        Ok(Chunk {
            id: self.id,
            document_id: self.document_id,
            position: u32::try_from(self.chunk_index).unwrap_or(0),
            content: self.content,
            token_count: u32::try_from(self.token_count).unwrap_or(0),
            embedding,
        })
    }
}

#[derive(FromRow)]
pub struct MergeRecordRow {
    pub id: i64,
    pub target_doc_id: String,
    pub source_topic_title: String,
    pub merge_strategy: String,
    pub changes_made: String,
    pub merged_at: DateTime<Utc>,
}

impl MergeRecordRow {
    pub fn into_merge_record(self) -> MergeRecord {
        let strategy = match self.merge_strategy.as_str() {
            "expand" => MergeStrategy::Expand,
            _ => MergeStrategy::Enrich,
        };
        MergeRecord {
            id: self.id,
            target_doc_id: self.target_doc_id,
            source_topic_title: self.source_topic_title,
            strategy,
            changes_made: self.changes_made,
            merged_at: self.merged_at,
        }
    }
}

//! DocumentCreator: a `Topic` becomes a new persisted
//! `Document` with its chunks.

use chrono::Utc;
use rand::Rng;
use ragkiln_chunker::{chunk_document, ChunkerConfig};
use ragkiln_core::{model::embedding_template, Chunk, Document, Topic};
use ragkiln_llm::{EmbeddingClient, EmbeddingProvider};
use tracing::instrument;
use uuid_like_id::slugify;

use crate::error::PipelineError;
use crate::store_backend::StoreBackend;

const MAX_ID_ATTEMPTS: u32 = 5;

/// Outcome the orchestrator aggregates into the run report.
pub struct CreateResult {
    pub doc_id: String,
    pub chunk_count: usize,
}

/// Builds, chunks, batch-embeds, and transactionally persists a new
/// document from `topic`.
#[instrument(skip(topic, store, embedding_client, chunker_config), fields(title = %topic.title))]
pub async fn create_document<E: EmbeddingProvider>(
    topic: &Topic,
    store: &dyn StoreBackend,
    embedding_client: &EmbeddingClient<E>,
    chunker_config: &ChunkerConfig,
) -> Result<CreateResult, PipelineError> {
    let doc_id = allocate_document_id(&topic.title, store).await?;

    let drafts = chunk_document(&topic.content, chunker_config);
    let chunk_texts: Vec<String> = drafts.iter().map(|d| d.content.clone()).collect();

    let chunk_embeddings = embedding_client.embed_batch(&chunk_texts).await?;
    let mut chunks = Vec::with_capacity(drafts.len());
    let mut position: u32 = 0;
    for (draft, embedding) in drafts.into_iter().zip(chunk_embeddings.into_iter()) {
        let Some(embedding) = embedding else {
            continue;
        };
        chunks.push(Chunk {
            id: format!("{doc_id}_chunk_{position}"),
            document_id: doc_id.clone(),
            position,
            content: draft.content,
            token_count: draft.token_count,
            embedding,
        });
        position += 1;
    }

    let doc_text = embedding_template(&topic.title, &topic.summary, &topic.content);
    let doc_embedding = embedding_client.embed(&doc_text).await?;

    let now = Utc::now();
    let document = Document {
        id: doc_id.clone(),
        title: topic.title.clone(),
        summary: topic.summary.clone(),
        content: topic.content.clone(),
        category: topic.category.clone(),
        keywords: topic.keywords.clone(),
        source_urls: std::iter::once(topic.source_url.clone()).collect(),
        embedding: Some(doc_embedding),
        created_at: now,
        updated_at: now,
    };

    let chunk_count = chunks.len();
    store.insert(&document, &chunks).await?;

    Ok(CreateResult { doc_id, chunk_count })
}

/// `slug(title) + "_" + now("YYYYMMDD_HHMMSS")`; on collision, append a
/// short random suffix and retry, bounded.
async fn allocate_document_id(title: &str, store: &dyn StoreBackend) -> Result<String, PipelineError> {
    let base = slugify(title);
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let mut candidate = format!("{base}_{timestamp}");

    for attempt in 0..MAX_ID_ATTEMPTS {
        if store.get_by_id(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        let suffix: u32 = rand::thread_rng().gen_range(1000..9999);
        candidate = format!("{base}_{timestamp}_{suffix}");
        if attempt + 1 == MAX_ID_ATTEMPTS {
            return Err(PipelineError::IdGenerationExhausted(MAX_ID_ATTEMPTS));
        }
    }
    Ok(candidate)
}

/// Small free-standing slugify module; kept local to this crate since the
/// only consumer is document-id allocation and no corpus crate exposes one
/// as a reusable dependency.
mod uuid_like_id {
    pub fn slugify(title: &str) -> String {
        let mut slug = String::with_capacity(title.len());
        let mut last_was_dash = true;
        for ch in title.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
                last_was_dash = false;
            } else if !last_was_dash {
                slug.push('_');
                last_was_dash = true;
            }
        }
        let trimmed = slug.trim_end_matches('_');
        if trimmed.is_empty() {
            "untitled".to_string()
        } else {
            trimmed.to_string()
        }
    }

}

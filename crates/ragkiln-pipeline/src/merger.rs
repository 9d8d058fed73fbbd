//! DocumentMerger: append-then-reorganize merge of a
//! `Topic` into an existing target document.

use chrono::Utc;
use ragkiln_chunker::{chunk_document, ChunkerConfig};
use ragkiln_core::{model::embedding_template, Chunk, MergeStrategy, Topic};
use ragkiln_llm::chat::ResponseShape;
use ragkiln_llm::{EmbeddingClient, EmbeddingProvider, LlmClient, LlmProvider};
use serde::Deserialize;
use tracing::instrument;

use crate::error::PipelineError;
use crate::store_backend::StoreBackend;

pub struct MergeResult {
    pub target_doc_id: String,
    pub strategy: MergeStrategy,
    pub chunk_count: usize,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    content: String,
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
    changes_made: String,
    strategy: String,
}

fn rewrite_prompt(old_content: &str, topic: &Topic) -> String {
    format!(
        "Merge the following new material into an existing document, producing a single \
         coherent rewritten document. Choose strategy \"enrich\" if the new material adds \
         detail to an existing section, or \"expand\" if it introduces a new section.\n\n\
         EXISTING DOCUMENT:\n{old_content}\n\n\
         NEW MATERIAL (title: {}):\n{}\n\n\
         Respond with a JSON object: {{\"content\": \"...\", \"summary\": \"...\", \
         \"keywords\": [\"...\"], \"changes_made\": \"...\", \"strategy\": \"enrich\" | \"expand\"}}",
        topic.title, topic.content
    )
}

/// Folds a topic into an existing document: re-summarizes, re-chunks, and
/// persists the result. Multiple topics targeting the same document within
/// one page are merged sequentially through repeated calls to this
/// function, never batched — the caller (`Orchestrator`) is responsible for
/// that ordering, not this function.
#[instrument(skip(topic, store, llm_client, embedding_client, chunker_config), fields(target_doc_id, title = %topic.title))]
pub async fn merge_document<E: EmbeddingProvider, L: LlmProvider>(
    target_doc_id: &str,
    topic: &Topic,
    store: &dyn StoreBackend,
    llm_client: &LlmClient<L>,
    embedding_client: &EmbeddingClient<E>,
    chunker_config: &ChunkerConfig,
) -> Result<MergeResult, PipelineError> {
    let Some((mut document, _old_chunks)) = store.get_by_id(target_doc_id).await? else {
        return Err(PipelineError::MergeTargetMissing(target_doc_id.to_string()));
    };

    let prompt = rewrite_prompt(&document.content, topic);
    let rewrite: RewriteResponse = llm_client
        .generate(&prompt, ResponseShape::JsonObject)
        .await
        .and_then(|value| serde_json::from_value(value).map_err(|e| ragkiln_llm::LlmError::Parse(e.to_string())))?;

    let strategy = if rewrite.strategy.eq_ignore_ascii_case("expand") {
        MergeStrategy::Expand
    } else {
        MergeStrategy::Enrich
    };

    let drafts = chunk_document(&rewrite.content, chunker_config);
    let chunk_texts: Vec<String> = drafts.iter().map(|d| d.content.clone()).collect();
    let chunk_embeddings = embedding_client.embed_batch(&chunk_texts).await?;

    let mut chunks = Vec::with_capacity(drafts.len());
    let mut position: u32 = 0;
    for (draft, embedding) in drafts.into_iter().zip(chunk_embeddings.into_iter()) {
        let Some(embedding) = embedding else {
            continue;
        };
        chunks.push(Chunk {
            id: format!("{target_doc_id}_chunk_{position}"),
            document_id: target_doc_id.to_string(),
            position,
            content: draft.content,
            token_count: draft.token_count,
            embedding,
        });
        position += 1;
    }

    let doc_text = embedding_template(&document.title, &rewrite.summary, &rewrite.content);
    let doc_embedding = embedding_client.embed(&doc_text).await?;

    document.content = rewrite.content;
    document.summary = rewrite.summary;
    document.keywords.extend(rewrite.keywords);
    document.source_urls.insert(topic.source_url.clone());
    document.embedding = Some(doc_embedding);
    document.updated_at = Utc::now();

    let chunk_count = chunks.len();
    store
        .apply_merge(&document, &chunks, &topic.title, strategy, &rewrite.changes_made)
        .await?;

    Ok(MergeResult {
        target_doc_id: target_doc_id.to_string(),
        strategy,
        chunk_count,
    })
}

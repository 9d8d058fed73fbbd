//! MergeDecider: topic + existing documents -> `Decision`.

use std::collections::HashMap;
use std::sync::Mutex;

use ragkiln_core::{cosine_similarity, Decision, Embedding, Topic};
use ragkiln_llm::chat::ResponseShape;
use ragkiln_llm::{EmbeddingClient, EmbeddingProvider, LlmClient, LlmProvider};
use ragkiln_store::DocumentSummary;
use serde::Deserialize;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct MergeThresholds {
    pub high: f32,
    pub low: f32,
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self { high: 0.85, low: 0.40 }
    }
}

/// De-duplicates LLM verification calls by `(target_doc_id, normalized_topic_title)`
/// so that a given pair is arbitrated at most once per invocation. Shared across the whole run,
/// not just one page — verification cost is paid once per distinct pair for
/// the run's lifetime.
#[derive(Default)]
pub struct VerifyCache {
    decisions: Mutex<HashMap<(String, String), Decision>>,
}

impl VerifyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &(String, String)) -> Option<Decision> {
        self.decisions.lock().unwrap().get(key).cloned()
    }

    fn insert(&self, key: (String, String), decision: Decision) {
        self.decisions.lock().unwrap().insert(key, decision);
    }

    pub fn calls_made(&self) -> usize {
        self.decisions.lock().unwrap().len()
    }
}

/// Everything a single `decide` call needs to report back to the
/// orchestrator beyond the bare `Decision`: the topic embedding (so the
/// caller never recomputes it), any document embeddings this call computed
/// opportunistically for documents the store returned with `embedding: null`,
/// and whether the uncertain-band LLM path was actually entered (for the
/// `decisions.verify` counter).
pub struct DecisionOutcome {
    pub decision: Decision,
    pub topic_embedding: Embedding,
    pub backfills: Vec<(String, Embedding)>,
    pub entered_verify: bool,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    decision: String,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

fn verification_prompt(topic: &Topic, best: &DocumentSummary, similarity: f32) -> String {
    let topic_preview: String = topic.content.chars().take(1000).collect();
    let target_preview: String = best.summary.chars().take(1000).collect();
    format!(
        "A new topic may duplicate or extend an existing document. Decide MERGE or CREATE.\n\n\
         Examples:\n\
         - Topic about installing a CLI tool vs. an existing \"Installation\" document -> MERGE\n\
         - Topic about billing vs. an existing \"Installation\" document -> CREATE\n\n\
         Similarity score: {similarity:.3}\n\
         Topic content preview: {topic_preview}\n\
         Existing document summary preview: {target_preview}\n\n\
         Respond with a JSON object: {{\"decision\": \"MERGE\" | \"CREATE\", \"reason\": \"...\"}}"
    )
}

/// Decides whether a topic should create a new document, merge into an
/// existing one, or escalate to an LLM verification call in the uncertain
/// similarity band. `existing_docs` is the caller's snapshot read at the
/// start of the page; this function never re-reads the store.
#[instrument(skip(topic, existing_docs, embedding_client, llm_client, verify_cache), fields(title = %topic.title))]
pub async fn decide<E: EmbeddingProvider, L: LlmProvider>(
    topic: &Topic,
    existing_docs: &[DocumentSummary],
    embedding_client: &EmbeddingClient<E>,
    llm_client: &LlmClient<L>,
    thresholds: MergeThresholds,
    verify_cache: &VerifyCache,
) -> Result<DecisionOutcome, ragkiln_llm::EmbeddingError> {
    let topic_embedding = embedding_client.embed(&topic.embedding_text()).await?;

    let mut backfills = Vec::new();
    let mut best: Option<(&DocumentSummary, f32)> = None;
    for doc in existing_docs {
        let doc_embedding = match &doc.embedding {
            Some(embedding) => embedding.clone(),
            None => {
                // DocumentSummary carries no content, so the content-prefix
                // fallback half of embedding_template is unreachable here;
                // every document that ever gets an embedding has a summary
                // from DocumentCreator/DocumentMerger, so this degrades
                // gracefully rather than diverging from it in practice.
                let computed = embedding_client
                    .embed(&format!("{}. {}", doc.title, doc.summary))
                    .await?;
                backfills.push((doc.id.clone(), computed.clone()));
                computed
            }
        };
        let similarity = cosine_similarity(&topic_embedding, &doc_embedding);
        best = Some(match best {
            None => (doc, similarity),
            Some((current_doc, current_sim)) => {
                if similarity > current_sim + 1e-6 {
                    (doc, similarity)
                } else if (similarity - current_sim).abs() <= 1e-6 && doc.id < current_doc.id {
                    (doc, similarity)
                } else {
                    (current_doc, current_sim)
                }
            }
        });
    }

    let Some((best_doc, best_similarity)) = best else {
        return Ok(DecisionOutcome {
            decision: Decision::Create,
            topic_embedding,
            backfills,
            entered_verify: false,
        });
    };

    if best_similarity >= thresholds.high {
        return Ok(DecisionOutcome {
            decision: Decision::Merge {
                target_doc_id: best_doc.id.clone(),
            },
            topic_embedding,
            backfills,
            entered_verify: false,
        });
    }
    if best_similarity < thresholds.low {
        return Ok(DecisionOutcome {
            decision: Decision::Create,
            topic_embedding,
            backfills,
            entered_verify: false,
        });
    }

    // Uncertain band: dedup by (target doc, normalized title) before
    // dispatching an LLM verification call.
    let cache_key = (best_doc.id.clone(), topic.normalized_title());
    if let Some(cached) = verify_cache.get(&cache_key) {
        return Ok(DecisionOutcome {
            decision: cached,
            topic_embedding,
            backfills,
            entered_verify: true,
        });
    }

    let prompt = verification_prompt(topic, best_doc, best_similarity);
    let decision = match llm_client.generate(&prompt, ResponseShape::JsonObject).await {
        Ok(value) => match serde_json::from_value::<VerificationResponse>(value) {
            Ok(response) if response.decision.eq_ignore_ascii_case("merge") => Decision::Merge {
                target_doc_id: best_doc.id.clone(),
            },
            Ok(_) => Decision::Create,
            Err(error) => {
                warn!(?error, "verification response did not match the expected shape, defaulting to create");
                Decision::Create
            }
        },
        Err(error) => {
            // An LLM error during verification defaults to create.
            // Duplication is recoverable; loss isn't.
            warn!(?error, "LLM verification call failed, defaulting to create");
            Decision::Create
        }
    };

    verify_cache.insert(cache_key, decision.clone());

    Ok(DecisionOutcome {
        decision,
        topic_embedding,
        backfills,
        entered_verify: true,
    })
}

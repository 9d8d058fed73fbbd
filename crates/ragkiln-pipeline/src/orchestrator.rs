//! Orchestrator: sequences the five stages per page,
//! enforcing fail-fast and skip semantics and aggregating the run report.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ragkiln_chunker::ChunkerConfig;
use ragkiln_core::{Crawler, Decision, RunError, RunReport, StageStatus};
use ragkiln_llm::{EmbeddingClient, EmbeddingProvider, LlmClient, LlmProvider};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::creator::create_document;
use crate::decider::{decide, MergeThresholds, VerifyCache};
use crate::extractor::{extract_topics, ExtractorConfig};
use crate::merger::merge_document;
use crate::store_backend::StoreBackend;

const STAGE_CRAWL: &str = "crawl";
const STAGE_EXTRACT: &str = "extract_topics";
const STAGE_DECIDE: &str = "merge_decision";
const STAGE_PERSIST: &str = "persist";

pub struct OrchestratorConfig {
    pub start_url: String,
    pub max_pages: usize,
    pub extractor: ExtractorConfig,
    pub chunker: ChunkerConfig,
    pub thresholds: MergeThresholds,
    pub llm_concurrency: usize,
}

pub struct Orchestrator<'a, C, L, E> {
    crawler: &'a C,
    store: &'a dyn StoreBackend,
    llm_client: &'a LlmClient<L>,
    embedding_client: &'a EmbeddingClient<E>,
    config: OrchestratorConfig,
}

impl<'a, C, L, E> Orchestrator<'a, C, L, E>
where
    C: Crawler,
    L: LlmProvider,
    E: EmbeddingProvider,
{
    pub fn new(
        crawler: &'a C,
        store: &'a dyn StoreBackend,
        llm_client: &'a LlmClient<L>,
        embedding_client: &'a EmbeddingClient<E>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            crawler,
            store,
            llm_client,
            embedding_client,
            config,
        }
    }

    /// Runs the full pipeline for one invocation. `cancel`
    /// propagates a cooperative cancel signal checked between pages and
    /// before each stage; already-committed work is kept.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::empty();

        let crawl_output = match self.crawler.crawl(&self.config.start_url, self.config.max_pages).await {
            Ok(output) => output,
            Err(error) => {
                report
                    .stage_statuses
                    .insert(STAGE_CRAWL.to_string(), StageStatus::Failed);
                report
                    .errors
                    .push(RunError::new(STAGE_CRAWL, "fatal", error.to_string()));
                return report;
            }
        };

        report.pages_crawled = crawl_output.pages_crawled();

        // Fail-fast rule.
        if report.pages_crawled == 0 {
            report
                .stage_statuses
                .insert(STAGE_CRAWL.to_string(), StageStatus::Failed);
            report
                .errors
                .push(RunError::new(STAGE_CRAWL, "fatal", "crawl produced zero pages"));
            return report;
        }
        report
            .stage_statuses
            .insert(STAGE_CRAWL.to_string(), StageStatus::Success);

        let verify_cache = VerifyCache::new();
        let semaphore = Arc::new(Semaphore::new(self.config.llm_concurrency.max(1)));

        let mut any_extracted = false;
        let mut any_decided = false;
        let mut persist_attempts = 0usize;
        let mut persist_failures = 0usize;

        for page in &crawl_output.pages {
            if cancel.is_cancelled() {
                report
                    .errors
                    .push(RunError::new(STAGE_PERSIST, "cancelled", "run cancelled before all pages processed"));
                break;
            }

            // ExtractTopics (C5). `output_dir` existing and pages_crawled>0
            // is guaranteed by the fatal check above; an empty topic list
            // from a single page is a per-page skip, not fatal.
            let topics = extract_topics(page, self.llm_client, &self.config.extractor).await;
            if topics.is_empty() {
                continue;
            }
            any_extracted = true;
            report.topics_extracted += topics.len();

            if cancel.is_cancelled() {
                break;
            }

            // MergeDecision (C6). Snapshot read at the start of the page
            //: every topic on this page is
            // decided against the same `existing_docs`, independent of
            // decisions made earlier in this same page.
            let existing_docs = match self.store.get_all().await {
                Ok(docs) => docs,
                Err(error) => {
                    report
                        .errors
                        .push(RunError::new(STAGE_DECIDE, "fatal", error.to_string()));
                    continue;
                }
            };

            let embedding_client = self.embedding_client;
            let llm_client = self.llm_client;
            let thresholds = self.config.thresholds;

            let decisions = stream::iter(topics.iter().map(|topic| {
                let existing_docs = &existing_docs;
                let semaphore = Arc::clone(&semaphore);
                let verify_cache = &verify_cache;
                async move {
                    let _permit = semaphore.acquire().await;
                    decide(topic, existing_docs, embedding_client, llm_client, thresholds, verify_cache).await
                }
            }))
            .buffered(self.config.llm_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

            any_decided = true;

            // Creates and merges are applied in the order topics were
            // extracted; DB writes within a
            // page are serialized, one transaction per topic.
            for (topic, outcome) in topics.iter().zip(decisions.into_iter()) {
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(?error, topic = %topic.title, "embedding call failed during decision, skipping topic");
                        report.errors.push(
                            RunError::new(STAGE_DECIDE, "transient", error.to_string()).with_topic(topic.title.clone()),
                        );
                        continue;
                    }
                };

                for (doc_id, embedding) in outcome.backfills {
                    // Opportunistic, best-effort: never block or fail the
                    // decision on a backfill write.
                    if let Err(error) = self.store.backfill_embedding(&doc_id, embedding).await {
                        warn!(?error, doc_id, "failed to backfill document embedding");
                    }
                }

                match &outcome.decision {
                    Decision::Create => {
                        persist_attempts += 1;
                        match create_document(topic, self.store, self.embedding_client, &self.config.chunker).await {
                            Ok(result) => {
                                report.documents_created += 1;
                                report.decisions.create += 1;
                                info!(doc_id = %result.doc_id, chunks = result.chunk_count, "created document");
                            }
                            Err(error) => {
                                persist_failures += 1;
                                report.errors.push(
                                    RunError::new(STAGE_PERSIST, "fatal", error.to_string())
                                        .with_topic(topic.title.clone()),
                                );
                            }
                        }
                    }
                    Decision::Merge { target_doc_id } => {
                        persist_attempts += 1;
                        match merge_document(
                            target_doc_id,
                            topic,
                            self.store,
                            self.llm_client,
                            self.embedding_client,
                            &self.config.chunker,
                        )
                        .await
                        {
                            Ok(result) => {
                                report.documents_merged += 1;
                                report.decisions.merge += 1;
                                info!(doc_id = %result.target_doc_id, strategy = %result.strategy, "merged document");
                            }
                            Err(error) => {
                                persist_failures += 1;
                                report.errors.push(
                                    RunError::new(STAGE_PERSIST, "fatal", error.to_string())
                                        .with_topic(topic.title.clone()),
                                );
                            }
                        }
                    }
                    Decision::Verify { .. } => unreachable!("resolved by decide() before reaching here"),
                }

                if outcome.entered_verify {
                    report.decisions.verify += 1;
                }
            }
        }

        report
            .stage_statuses
            .insert(STAGE_EXTRACT.to_string(), if any_extracted { StageStatus::Success } else { StageStatus::Skipped });
        report
            .stage_statuses
            .insert(STAGE_DECIDE.to_string(), if any_decided { StageStatus::Success } else { StageStatus::Skipped });

        let persist_status = if persist_attempts == 0 {
            StageStatus::Skipped
        } else if persist_failures == 0 {
            StageStatus::Success
        } else if persist_failures == persist_attempts {
            StageStatus::Failed
        } else {
            StageStatus::Partial
        };
        report.stage_statuses.insert(STAGE_PERSIST.to_string(), persist_status);

        report
    }
}

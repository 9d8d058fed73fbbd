//! The store-facing boundary the pipeline depends on, rather than
//! `ragkiln_store::PgDocumentStore` directly. Exercising the pipeline's
//! behavior end-to-end needs a substitutable backend since no live
//! Postgres instance is available to this test suite; this trait is that
//! seam, mirroring the `Crawler` boundary in `ragkiln-core`.

use async_trait::async_trait;
use ragkiln_core::{Chunk, Document, MergeStrategy};
use ragkiln_store::{DocumentSummary, PgDocumentStore, StoreError};

#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn get_all(&self) -> Result<Vec<DocumentSummary>, StoreError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<(Document, Vec<Chunk>)>, StoreError>;
    async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<(), StoreError>;
    async fn apply_merge(
        &self,
        document: &Document,
        chunks: &[Chunk],
        source_topic_title: &str,
        strategy: MergeStrategy,
        changes_made: &str,
    ) -> Result<(), StoreError>;
    /// Opportunistic backfill of a document's embedding when `GetAll`
    /// returned `None` for it. Never blocks a decision:
    /// callers fire this and move on without awaiting its outcome on the
    /// critical path.
    async fn backfill_embedding(
        &self,
        document_id: &str,
        embedding: ragkiln_core::Embedding,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl StoreBackend for PgDocumentStore {
    async fn get_all(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        PgDocumentStore::get_all(self).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<(Document, Vec<Chunk>)>, StoreError> {
        PgDocumentStore::get_by_id(self, id).await
    }

    async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<(), StoreError> {
        PgDocumentStore::insert(self, document, chunks).await
    }

    async fn apply_merge(
        &self,
        document: &Document,
        chunks: &[Chunk],
        source_topic_title: &str,
        strategy: MergeStrategy,
        changes_made: &str,
    ) -> Result<(), StoreError> {
        PgDocumentStore::apply_merge(self, document, chunks, source_topic_title, strategy, changes_made).await
    }

    async fn backfill_embedding(
        &self,
        document_id: &str,
        embedding: ragkiln_core::Embedding,
    ) -> Result<(), StoreError> {
        PgDocumentStore::set_embedding(self, document_id, Some(&embedding)).await
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_double {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// An in-process stand-in for `PgDocumentStore`, keyed by document id.
    /// Mirrors `StaticCrawler` in `ragkiln-core`: a deterministic double for
    /// the one external collaborator this crate cannot exercise directly.
    #[derive(Default)]
    pub struct InMemoryStore {
        documents: Mutex<HashMap<String, (Document, Vec<Chunk>)>>,
        merge_log: Mutex<Vec<(String, String, MergeStrategy, String)>>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, document: Document, chunks: Vec<Chunk>) {
            self.documents
                .lock()
                .unwrap()
                .insert(document.id.clone(), (document, chunks));
        }

        pub fn merge_log(&self) -> Vec<(String, String, MergeStrategy, String)> {
            self.merge_log.lock().unwrap().clone()
        }

        pub fn document_count(&self) -> usize {
            self.documents.lock().unwrap().len()
        }

        pub fn get(&self, id: &str) -> Option<Document> {
            self.documents.lock().unwrap().get(id).map(|(d, _)| d.clone())
        }
    }

    #[async_trait]
    impl StoreBackend for InMemoryStore {
        async fn get_all(&self) -> Result<Vec<DocumentSummary>, StoreError> {
            let guard = self.documents.lock().unwrap();
            Ok(guard
                .values()
                .map(|(d, chunks)| DocumentSummary {
                    id: d.id.clone(),
                    title: d.title.clone(),
                    summary: d.summary.clone(),
                    category: d.category.clone(),
                    keywords: d.keywords.clone(),
                    source_urls: d.source_urls.clone(),
                    embedding: d.embedding.clone(),
                    created_at: d.created_at,
                    updated_at: d.updated_at,
                    chunk_count: chunks.len() as i64,
                    content_length: d.content.len() as i64,
                })
                .collect())
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<(Document, Vec<Chunk>)>, StoreError> {
            Ok(self.documents.lock().unwrap().get(id).cloned())
        }

        async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<(), StoreError> {
            let mut guard = self.documents.lock().unwrap();
            if guard.contains_key(&document.id) {
                return Err(StoreError::Transaction(format!(
                    "document {} already exists",
                    document.id
                )));
            }
            guard.insert(document.id.clone(), (document.clone(), chunks.to_vec()));
            Ok(())
        }

        async fn apply_merge(
            &self,
            document: &Document,
            chunks: &[Chunk],
            source_topic_title: &str,
            strategy: MergeStrategy,
            changes_made: &str,
        ) -> Result<(), StoreError> {
            let mut guard = self.documents.lock().unwrap();
            if !guard.contains_key(&document.id) {
                return Err(StoreError::NotFound(document.id.clone()));
            }
            guard.insert(document.id.clone(), (document.clone(), chunks.to_vec()));
            drop(guard);
            self.merge_log.lock().unwrap().push((
                document.id.clone(),
                source_topic_title.to_string(),
                strategy,
                changes_made.to_string(),
            ));
            Ok(())
        }

        async fn backfill_embedding(
            &self,
            document_id: &str,
            embedding: ragkiln_core::Embedding,
        ) -> Result<(), StoreError> {
            let mut guard = self.documents.lock().unwrap();
            if let Some((doc, _)) = guard.get_mut(document_id) {
                doc.embedding = Some(embedding);
            }
            Ok(())
        }
    }

    /// Simulates a store whose Nth `insert`/`apply_merge` call fails, to
    /// drive the partial-failure scenario without a live DB.
    pub struct FlakyStore {
        inner: InMemoryStore,
        fail_on_call: usize,
        call_count: Mutex<usize>,
    }

    impl FlakyStore {
        pub fn new(fail_on_call: usize) -> Self {
            Self {
                inner: InMemoryStore::new(),
                fail_on_call,
                call_count: Mutex::new(0),
            }
        }

        pub fn document_count(&self) -> usize {
            self.inner.document_count()
        }
    }

    #[async_trait]
    impl StoreBackend for FlakyStore {
        async fn get_all(&self) -> Result<Vec<DocumentSummary>, StoreError> {
            self.inner.get_all().await
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<(Document, Vec<Chunk>)>, StoreError> {
            self.inner.get_by_id(id).await
        }

        async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<(), StoreError> {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            if *count == self.fail_on_call {
                return Err(StoreError::Transaction("simulated chunk-insert failure".into()));
            }
            drop(count);
            self.inner.insert(document, chunks).await
        }

        async fn apply_merge(
            &self,
            document: &Document,
            chunks: &[Chunk],
            source_topic_title: &str,
            strategy: MergeStrategy,
            changes_made: &str,
        ) -> Result<(), StoreError> {
            self.inner
                .apply_merge(document, chunks, source_topic_title, strategy, changes_made)
                .await
        }

        async fn backfill_embedding(
            &self,
            document_id: &str,
            embedding: ragkiln_core::Embedding,
        ) -> Result<(), StoreError> {
            self.inner.backfill_embedding(document_id, embedding).await
        }
    }
}

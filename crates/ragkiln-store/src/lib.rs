//! Postgres + pgvector document store.
//!
//! All writes that touch more than one table (document creation, merges)
//! run inside a single transaction so a crash mid-merge can never leave a
//! document with stale chunks or a missing audit row.

pub mod error;
mod rows;

use std::time::Duration;

use pgvector::Vector;
use ragkiln_core::{Chunk, Document, Embedding, MergeRecord, MergeStrategy};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::instrument;

pub use error::StoreError;
pub use rows::DocumentSummary;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Settings needed to build a pool; mirrors `ragkiln_config::DbConfig` but
/// the store crate does not depend on `ragkiln-config` to keep the
/// dependency graph a DAG rooted at the CLI.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub dsn: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// The document store. Cheap to clone: it wraps a connection pool.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.dsn)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Test-only constructor for an already-built pool (e.g. one pointed at
    /// a throwaway schema by the caller).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    /// All documents, with chunk-aggregate stats but not full `content`
    ///.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let rows: Vec<rows::DocumentSummaryRow> = sqlx::query_as(
            r#"
            SELECT
                d.id, d.title, d.summary, d.category, d.keywords, d.source_urls,
                d.embedding, d.created_at, d.updated_at,
                COUNT(c.id) AS chunk_count,
                COALESCE(SUM(LENGTH(c.content)), 0) AS content_length
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| r.into_summary()).collect()
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Option<(Document, Vec<Chunk>)>, StoreError> {
        let doc_row: Option<rows::DocumentRow> = sqlx::query_as(
            "SELECT id, title, summary, content, category, keywords, source_urls, \
             embedding, created_at, updated_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(doc_row) = doc_row else {
            return Ok(None);
        };
        let document = doc_row.into_document()?;

        let chunk_rows: Vec<rows::ChunkRow> = sqlx::query_as(
            "SELECT id, document_id, content, embedding, chunk_index, token_count \
             FROM chunks WHERE document_id = $1 ORDER BY chunk_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let chunks = chunk_rows
            .into_iter()
            .map(|r| r.into_chunk())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some((document, chunks)))
    }

    /// Insert a brand-new document and its chunks in one transaction
    ///.
    #[instrument(skip(self, document, chunks))]
    pub async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_document(&mut tx, document).await?;
        insert_chunks(&mut tx, &document.id, chunks).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Replace an existing document's fields and chunk set, append a merge
    /// record, all in one transaction.
    #[instrument(skip(self, document, chunks, changes_made))]
    pub async fn apply_merge(
        &self,
        document: &Document,
        chunks: &[Chunk],
        source_topic_title: &str,
        strategy: MergeStrategy,
        changes_made: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        update_document(&mut tx, document).await?;
        replace_chunks(&mut tx, &document.id, chunks).await?;
        insert_merge_record(
            &mut tx,
            &document.id,
            source_topic_title,
            strategy,
            changes_made,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Updates only the `embedding` column. Used for the opportunistic
    /// backfill of documents the store returned with no embedding, which
    /// must never touch `content`, `summary`, or `updated_at` — those
    /// belong solely to the merge path.
    #[instrument(skip(self, embedding))]
    pub async fn set_embedding(&self, id: &str, embedding: Option<&Embedding>) -> Result<(), StoreError> {
        let vector = embedding.map(embedding_to_vector);
        let result = sqlx::query("UPDATE documents SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(vector)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn merge_history_for(&self, target_doc_id: &str) -> Result<Vec<MergeRecord>, StoreError> {
        let rows: Vec<rows::MergeRecordRow> = sqlx::query_as(
            "SELECT id, target_doc_id, source_topic_title, merge_strategy, changes_made, merged_at \
             FROM merge_history WHERE target_doc_id = $1 ORDER BY merged_at",
        )
        .bind(target_doc_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.into_merge_record()).collect())
    }
}

fn embedding_to_vector(embedding: &Embedding) -> Vector {
    Vector::from(embedding.as_slice().to_vec())
}

async fn insert_document(tx: &mut Transaction<'_, Postgres>, document: &Document) -> Result<(), StoreError> {
    let keywords: Vec<String> = document.keywords.iter().cloned().collect();
    let source_urls: Vec<String> = document.source_urls.iter().cloned().collect();
    let embedding = document.embedding.as_ref().map(embedding_to_vector);
    sqlx::query(
        "INSERT INTO documents \
         (id, title, summary, content, category, keywords, source_urls, embedding, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&document.id)
    .bind(&document.title)
    .bind(&document.summary)
    .bind(&document.content)
    .bind(&document.category)
    .bind(&keywords)
    .bind(&source_urls)
    .bind(embedding)
    .bind(document.created_at)
    .bind(document.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_document(tx: &mut Transaction<'_, Postgres>, document: &Document) -> Result<(), StoreError> {
    let keywords: Vec<String> = document.keywords.iter().cloned().collect();
    let source_urls: Vec<String> = document.source_urls.iter().cloned().collect();
    let embedding = document.embedding.as_ref().map(embedding_to_vector);
    let result = sqlx::query(
        "UPDATE documents SET title = $2, summary = $3, content = $4, category = $5, \
         keywords = $6, source_urls = $7, embedding = $8, updated_at = $9 WHERE id = $1",
    )
    .bind(&document.id)
    .bind(&document.title)
    .bind(&document.summary)
    .bind(&document.content)
    .bind(&document.category)
    .bind(&keywords)
    .bind(&source_urls)
    .bind(embedding)
    .bind(document.updated_at)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(document.id.clone()));
    }
    Ok(())
}

async fn insert_chunks(
    tx: &mut Transaction<'_, Postgres>,
    document_id: &str,
    chunks: &[Chunk],
) -> Result<(), StoreError> {
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, content, embedding, chunk_index, token_count) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&chunk.id)
        .bind(document_id)
        .bind(&chunk.content)
        .bind(embedding_to_vector(&chunk.embedding))
        .bind(chunk.position as i32)
        .bind(chunk.token_count as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Delete-then-reinsert: simpler than diffing old vs. new chunk sets and
/// merges never reuse chunk ids.
async fn replace_chunks(
    tx: &mut Transaction<'_, Postgres>,
    document_id: &str,
    chunks: &[Chunk],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM chunks WHERE document_id = $1")
        .bind(document_id)
        .execute(&mut **tx)
        .await?;
    insert_chunks(tx, document_id, chunks).await
}

async fn insert_merge_record(
    tx: &mut Transaction<'_, Postgres>,
    target_doc_id: &str,
    source_topic_title: &str,
    strategy: MergeStrategy,
    changes_made: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO merge_history (target_doc_id, source_topic_title, merge_strategy, changes_made) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(target_doc_id)
    .bind(source_topic_title)
    .bind(strategy.to_string())
    .bind(changes_made)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_settings_are_plain_data() {
        let settings = PoolSettings {
            dsn: "postgres://localhost/ragkiln".into(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        };
        assert_eq!(settings.min_connections, 1);
        assert_eq!(settings.max_connections, 10);
    }

    #[test]
    fn embedding_to_vector_round_trips_through_the_same_floats() {
        let embedding = Embedding::try_from(vec![0.5_f32; ragkiln_core::EMBEDDING_DIM]).unwrap();
        let vector = embedding_to_vector(&embedding);
        assert_eq!(vector.to_vec(), embedding.as_slice().to_vec());
    }
}

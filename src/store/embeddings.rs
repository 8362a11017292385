//! SQLite-backed embedding collection.
//!
//! At most one vector per message, stored as a little-endian f32 blob.
//! Search is a brute-force cosine scan over all records; the corpus this
//! pipeline serves is small enough that an ANN index would be overhead.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::config::StorePaths;
use crate::core::errors::PipelineError;

use super::messages::{format_timestamp, parse_timestamp};

/// One embedding row, ready to insert.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub message_id: String,
    pub thread_id: String,
    pub sent_at: DateTime<Utc>,
    pub vector: Vec<f32>,
    pub model_id: String,
}

/// A similarity-search candidate.
#[derive(Debug, Clone)]
pub struct EmbeddingHit {
    pub message_id: String,
    pub thread_id: String,
    pub score: f32,
}

#[derive(Clone)]
pub struct EmbeddingStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl EmbeddingStore {
    pub async fn new(paths: &StorePaths) -> Result<Self, PipelineError> {
        Self::with_path(paths.embeddings_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(PipelineError::storage)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), PipelineError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embeddings (
                message_id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                embedding BLOB NOT NULL,
                model_id TEXT NOT NULL,
                embedded_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_embeddings_thread ON embeddings(thread_id)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_sent_at ON embeddings(sent_at)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_thread_sent_at ON embeddings(thread_id, sent_at)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_embedded_at ON embeddings(embedded_at)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(PipelineError::storage)?;
        }

        Ok(())
    }

    /// Ids that already have a vector; the sync sweep's set difference
    /// starts from this.
    pub async fn existing_ids(&self) -> Result<HashSet<String>, PipelineError> {
        let rows = sqlx::query("SELECT message_id FROM embeddings")
            .fetch_all(&self.pool)
            .await
            .map_err(PipelineError::storage)?;

        Ok(rows.iter().map(|row| row.get("message_id")).collect())
    }

    /// Bulk insert inside one transaction. Ids that raced into existence
    /// since the pending set was computed are skipped, not errors; the
    /// returned count is the number actually written.
    pub async fn insert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize, PipelineError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;
        let mut inserted = 0usize;

        for record in records {
            let blob = serialize_embedding(&record.vector);

            let result = sqlx::query(
                "INSERT OR IGNORE INTO embeddings (message_id, thread_id, sent_at, embedding, model_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&record.message_id)
            .bind(&record.thread_id)
            .bind(format_timestamp(&record.sent_at))
            .bind(&blob)
            .bind(&record.model_id)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::storage)?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(PipelineError::storage)?;
        Ok(inserted)
    }

    /// Brute-force cosine scan, highest score first; ties break newest
    /// first so fresher conversations surface.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<EmbeddingHit>, PipelineError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT message_id, thread_id, sent_at, embedding FROM embeddings")
            .fetch_all(&self.pool)
            .await
            .map_err(PipelineError::storage)?;

        let mut scored: Vec<(EmbeddingHit, DateTime<Utc>)> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = deserialize_embedding(&embedding_bytes);
                let score = cosine_similarity(query_embedding, &stored);
                let sent_at: String = row.get("sent_at");

                Some((
                    EmbeddingHit {
                        message_id: row.get("message_id"),
                        thread_id: row.get("thread_id"),
                        score,
                    },
                    parse_timestamp(&sent_at),
                ))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(hit, _)| hit).collect())
    }

    pub async fn count(&self) -> Result<usize, PipelineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::storage)?;

        Ok(count as usize)
    }

    /// Records whose stored blob is missing, empty, or not the expected
    /// vector length.
    pub async fn count_invalid(&self, expected_dimension: usize) -> Result<usize, PipelineError> {
        let expected_bytes = (expected_dimension * 4) as i64;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM embeddings
             WHERE embedding IS NULL OR LENGTH(embedding) = 0 OR LENGTH(embedding) != ?1",
        )
        .bind(expected_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(count as usize)
    }

    /// Delete invalid records so their messages re-enter the pending set
    /// on the next sync. Corrupt vectors are regenerated, never patched.
    pub async fn delete_invalid(&self, expected_dimension: usize) -> Result<usize, PipelineError> {
        let expected_bytes = (expected_dimension * 4) as i64;
        let result = sqlx::query(
            "DELETE FROM embeddings
             WHERE embedding IS NULL OR LENGTH(embedding) = 0 OR LENGTH(embedding) != ?1",
        )
        .bind(expected_bytes)
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() as usize)
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record_at, temp_db_path};

    async fn test_store() -> EmbeddingStore {
        EmbeddingStore::with_path(temp_db_path("innbox-embeddings"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn batch_insert_skips_existing_ids() {
        let store = test_store().await;

        let first = vec![record_at("m1", "t1", 0, vec![1.0, 0.0])];
        assert_eq!(store.insert_batch(&first).await.unwrap(), 1);

        let replay = vec![
            record_at("m1", "t1", 0, vec![0.5, 0.5]),
            record_at("m2", "t2", 10, vec![0.0, 1.0]),
        ];
        assert_eq!(store.insert_batch(&replay).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 2);

        let ids = store.existing_ids().await.unwrap();
        assert!(ids.contains("m1") && ids.contains("m2"));
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = test_store().await;

        store
            .insert_batch(&[
                record_at("m1", "t1", 0, vec![1.0, 0.0, 0.0]),
                record_at("m2", "t2", 10, vec![0.7, 0.7, 0.0]),
                record_at("m3", "t3", 20, vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].message_id, "m1");
        assert!(hits[0].score > 0.99);
        assert_eq!(hits[1].message_id, "m2");
        assert!(hits[1].score < hits[0].score);
    }

    #[tokio::test]
    async fn invalid_dimension_records_are_found_and_deleted() {
        let store = test_store().await;

        store
            .insert_batch(&[
                record_at("ok", "t1", 0, vec![1.0, 0.0, 0.0]),
                record_at("short", "t2", 10, vec![1.0]),
                record_at("empty", "t3", 20, vec![]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count_invalid(3).await.unwrap(), 2);
        assert_eq!(store.delete_invalid(3).await.unwrap(), 2);
        assert_eq!(store.count_invalid(3).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);

        let ids = store.existing_ids().await.unwrap();
        assert!(ids.contains("ok"));
        assert!(!ids.contains("short"));
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let path = temp_db_path("innbox-embeddings-reopen");

        {
            let store = EmbeddingStore::with_path(path.clone()).await.unwrap();
            store
                .insert_batch(&[record_at("m1", "t1", 0, vec![0.1, 0.2])])
                .await
                .unwrap();
        }

        let reopened = EmbeddingStore::with_path(path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}

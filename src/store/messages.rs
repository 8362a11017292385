//! SQLite-backed message collection.
//!
//! One row per physical email, keyed by `message_id`. Inserts are
//! idempotent; repeated ingestion sweeps are the expected steady state.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::config::StorePaths;
use crate::core::errors::PipelineError;
use crate::mail::message::{Message, SenderClass};

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total: usize,
    pub operator: usize,
    pub external: usize,
    pub threads: usize,
}

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl MessageStore {
    pub async fn new(paths: &StorePaths) -> Result<Self, PipelineError> {
        Self::with_path(paths.messages_db_path.clone()).await
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
            "CREATE TABLE IF NOT EXISTS messages (
                message_id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                sender_class TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                raw_snippet TEXT NOT NULL DEFAULT '',
                from_header TEXT NOT NULL DEFAULT '',
                body_text TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id)",
            "CREATE INDEX IF NOT EXISTS idx_messages_sent_at ON messages(sent_at)",
            "CREATE INDEX IF NOT EXISTS idx_messages_thread_sent_at ON messages(thread_id, sent_at)",
            "CREATE INDEX IF NOT EXISTS idx_messages_sender_class ON messages(sender_class)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(PipelineError::storage)?;
        }

        Ok(())
    }

    /// Insert the message if its id is new. Returns `Ok(false)` (never an
    /// error) when a record with the same `message_id` already exists; the
    /// existing record is left untouched.
    pub async fn upsert(&self, message: &Message) -> Result<bool, PipelineError> {
        let result = sqlx::query(
            "INSERT INTO messages
                (message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(message_id) DO NOTHING",
        )
        .bind(&message.message_id)
        .bind(&message.thread_id)
        .bind(format_timestamp(&message.sent_at))
        .bind(message.sender_class.as_str())
        .bind(&message.subject)
        .bind(&message.raw_snippet)
        .bind(&message.from_header)
        .bind(&message.body_text)
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<Message>, PipelineError> {
        let row = sqlx::query(
            "SELECT message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text
             FROM messages
             WHERE message_id = ?1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(row.as_ref().map(row_to_message))
    }

    /// Full conversation for a thread, oldest first.
    pub async fn find_by_thread(&self, thread_id: &str) -> Result<Vec<Message>, PipelineError> {
        let rows = sqlx::query(
            "SELECT message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text
             FROM messages
             WHERE thread_id = ?1
             ORDER BY sent_at ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Most recent message in a thread (the thread head).
    pub async fn latest_by_thread(&self, thread_id: &str) -> Result<Option<Message>, PipelineError> {
        let row = sqlx::query(
            "SELECT message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text
             FROM messages
             WHERE thread_id = ?1
             ORDER BY sent_at DESC
             LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(row.as_ref().map(row_to_message))
    }

    /// External messages at or after `since`, newest first.
    pub async fn find_external_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, PipelineError> {
        let rows = sqlx::query(
            "SELECT message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text
             FROM messages
             WHERE sender_class = 'external' AND sent_at >= ?1
             ORDER BY sent_at DESC",
        )
        .bind(format_timestamp(&since))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Every stored message, oldest first. The embedding sync computes its
    /// pending set from this in application code.
    pub async fn all_chronological(&self) -> Result<Vec<Message>, PipelineError> {
        let rows = sqlx::query(
            "SELECT message_id, thread_id, sent_at, sender_class, subject, raw_snippet, from_header, body_text
             FROM messages
             ORDER BY sent_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Rewrite a stored sender class; used by the reclassification sweep.
    pub async fn set_sender_class(
        &self,
        message_id: &str,
        sender_class: SenderClass,
    ) -> Result<bool, PipelineError> {
        let result = sqlx::query(
            "UPDATE messages
             SET sender_class = ?2,
                 updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE message_id = ?1",
        )
        .bind(message_id)
        .bind(sender_class.as_str())
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<usize, PipelineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::storage)?;

        Ok(count as usize)
    }

    pub async fn stats(&self) -> Result<StoreStats, PipelineError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::storage)?;
        let operator: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE sender_class = 'operator'")
                .fetch_one(&self.pool)
                .await
                .map_err(PipelineError::storage)?;
        let threads: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT thread_id) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::storage)?;

        Ok(StoreStats {
            total: total as usize,
            operator: operator as usize,
            external: (total - operator) as usize,
            threads: threads as usize,
        })
    }
}

/// Fixed-width UTC RFC 3339 so lexicographic column order matches time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    let sent_at: String = row.get("sent_at");
    let sender_class: String = row.get("sender_class");

    Message {
        message_id: row.get("message_id"),
        thread_id: row.get("thread_id"),
        sent_at: parse_timestamp(&sent_at),
        sender_class: SenderClass::from_db(&sender_class),
        subject: row.get("subject"),
        raw_snippet: row.get("raw_snippet"),
        from_header: row.get("from_header"),
        body_text: row.get("body_text"),
    }
}

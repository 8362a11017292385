//! Incremental embedding sync over the message store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::llm::EmbeddingProvider;
use crate::mail::Message;
use crate::store::{EmbeddingRecord, EmbeddingStore, MessageStore};

use super::truncate_chars;

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct EmbeddingIndexer {
    messages: MessageStore,
    embeddings: EmbeddingStore,
    embedder: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
}

impl EmbeddingIndexer {
    pub fn new(
        messages: MessageStore,
        embeddings: EmbeddingStore,
        embedder: Arc<dyn EmbeddingProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            messages,
            embeddings,
            embedder,
            config,
        }
    }

    /// Embed every stored message that has no vector yet, oldest first,
    /// flushing in batches of `batch_size`. A failed model call costs only
    /// that message; it stays pending and is retried on the next sync.
    ///
    /// Not safe against a concurrent sync of the same stores: the window
    /// between reading the existing-id set and flushing a batch can
    /// double-embed a message. Both writes land on the same key, so the
    /// result is correct, just wasted model calls. Run one sweep at a time.
    pub async fn sync(&self, batch_size: usize) -> Result<SyncReport, PipelineError> {
        let existing = self.embeddings.existing_ids().await?;
        let pending: Vec<Message> = self
            .messages
            .all_chronological()
            .await?
            .into_iter()
            .filter(|m| !existing.contains(&m.message_id))
            .collect();

        let mut report = SyncReport::default();
        if pending.is_empty() {
            debug!("embedding index is up to date");
            return Ok(report);
        }
        info!(pending = pending.len(), "embedding sync started");

        let batch_size = batch_size.max(1);
        let mut batch: Vec<EmbeddingRecord> = Vec::with_capacity(batch_size);

        for message in &pending {
            if message.body_text.is_empty() {
                report.skipped += 1;
                continue;
            }

            let input = truncate_chars(&message.body_text, self.config.embed_input_max_chars);
            let vector = match self.embedder.embed(&[input]).await {
                Ok(vectors) => match vectors.into_iter().next() {
                    Some(vector) => vector,
                    None => {
                        warn!(message_id = %message.message_id, "embedder returned no vector");
                        report.failed += 1;
                        continue;
                    }
                },
                Err(err) => {
                    warn!(message_id = %message.message_id, "embedding failed: {err}");
                    report.failed += 1;
                    continue;
                }
            };

            if vector.len() != self.config.embedding_dimension {
                warn!(
                    message_id = %message.message_id,
                    got = vector.len(),
                    expected = self.config.embedding_dimension,
                    "embedder returned wrong dimension"
                );
                report.failed += 1;
                continue;
            }

            batch.push(EmbeddingRecord {
                message_id: message.message_id.clone(),
                thread_id: message.thread_id.clone(),
                sent_at: message.sent_at,
                vector,
                model_id: self.embedder.model_id().to_string(),
            });

            if batch.len() >= batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }

        self.flush(&mut batch, &mut report).await?;

        info!(
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed,
            "embedding sync finished"
        );
        Ok(report)
    }

    async fn flush(
        &self,
        batch: &mut Vec<EmbeddingRecord>,
        report: &mut SyncReport,
    ) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let inserted = self.embeddings.insert_batch(batch).await?;
        report.embedded += inserted;
        report.skipped += batch.len() - inserted;
        batch.clear();
        Ok(())
    }

    /// Count records whose vectors are missing, empty, or the wrong length.
    pub async fn verify(&self) -> Result<usize, PipelineError> {
        let invalid = self
            .embeddings
            .count_invalid(self.config.embedding_dimension)
            .await?;

        if invalid > 0 {
            warn!(invalid, "found embedding records with invalid vectors");
        } else {
            debug!("all embedding records are valid");
        }
        Ok(invalid)
    }

    /// Delete invalid records; their messages become pending again.
    pub async fn cleanup(&self) -> Result<usize, PipelineError> {
        let deleted = self
            .embeddings
            .delete_invalid(self.config.embedding_dimension)
            .await?;

        if deleted > 0 {
            info!(deleted, "removed invalid embedding records");
        }
        Ok(deleted)
    }
}

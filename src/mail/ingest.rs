//! Ingestion sweep: raw provider threads into the message store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::store::MessageStore;

use super::message::{classify, Message};
use super::normalize::normalize;
use super::payload::{MailSource, RawMessage};

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub threads: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub skipped_empty: usize,
}

pub struct Ingestor {
    source: Arc<dyn MailSource>,
    store: MessageStore,
    config: PipelineConfig,
}

impl Ingestor {
    pub fn new(source: Arc<dyn MailSource>, store: MessageStore, config: PipelineConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Walk recent threads and upsert every decodable message. Safe to
    /// re-run: duplicates are counted, not errors. A thread that fails to
    /// fetch is logged and skipped; the sweep continues.
    pub async fn collect(&self, max_threads: Option<usize>) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();

        let threads = self.source.list_recent_threads().await?;
        let limit = max_threads.unwrap_or(threads.len()).min(threads.len());
        info!(total = threads.len(), processing = limit, "ingest sweep started");

        for thread_ref in &threads[..limit] {
            let thread = match self.source.fetch_thread(&thread_ref.thread_id).await {
                Ok(thread) => thread,
                Err(err) => {
                    warn!(thread_id = %thread_ref.thread_id, "failed to fetch thread: {err}");
                    continue;
                }
            };
            report.threads += 1;

            for raw in &thread.messages {
                match self.extract(raw, &thread.thread_id) {
                    Some(message) => {
                        if self.store.upsert(&message).await? {
                            report.stored += 1;
                        } else {
                            report.duplicates += 1;
                        }
                    }
                    None => report.skipped_empty += 1,
                }
            }
        }

        info!(
            threads = report.threads,
            stored = report.stored,
            duplicates = report.duplicates,
            skipped = report.skipped_empty,
            "ingest sweep finished"
        );
        Ok(report)
    }

    /// Header extraction + normalization. `None` means the message is not
    /// worth storing (no id, or nothing decodable in the body).
    fn extract(&self, raw: &RawMessage, thread_id: &str) -> Option<Message> {
        let message_id = raw.header("Message-ID").map(str::trim).unwrap_or("");
        if message_id.is_empty() {
            debug!(thread_id, "skipping message without Message-ID header");
            return None;
        }

        let body_text = normalize(&raw.payload, &self.config.quote_markers);
        if body_text.is_empty() {
            debug!(thread_id, message_id, "skipping message with empty normalized body");
            return None;
        }

        let sent_at = raw
            .header("Date")
            .and_then(parse_date_header)
            .unwrap_or_else(Utc::now);
        let from_header = raw.header("From").unwrap_or("").to_string();
        let sender_class = classify(&from_header, &self.config.operator_domain);

        Some(Message {
            message_id: message_id.to_string(),
            thread_id: thread_id.to_string(),
            sent_at,
            sender_class,
            subject: raw.header("Subject").unwrap_or("").to_string(),
            raw_snippet: raw.snippet.clone(),
            from_header,
            body_text,
        })
    }
}

fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

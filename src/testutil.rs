//! Shared test fixtures: deterministic fake providers, a static mail
//! source, and temp-file store constructors.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::llm::{CompletionProvider, CompletionRequest, EmbeddingProvider};
use crate::mail::{MailSource, MailThread, Message, PayloadNode, RawMessage, SenderClass, ThreadRef};
use crate::store::{EmbeddingRecord, EmbeddingStore, MessageStore};

pub fn temp_db_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{prefix}-{}.db", uuid::Uuid::new_v4()))
}

pub async fn message_store() -> MessageStore {
    MessageStore::with_path(temp_db_path("innbox-messages-test"))
        .await
        .unwrap()
}

pub async fn embedding_store() -> EmbeddingStore {
    EmbeddingStore::with_path(temp_db_path("innbox-embeddings-test"))
        .await
        .unwrap()
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        operator_domain: "riverinn.example".to_string(),
        embedding_model_id: "test-hash-embed".to_string(),
        embedding_dimension: 32,
        batch_size: 4,
        ..PipelineConfig::default()
    }
}

/// Fixed instant all test message timestamps offset from.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn message_at(
    message_id: &str,
    thread_id: &str,
    minutes: i64,
    sender_class: SenderClass,
    body: &str,
) -> Message {
    let from_header = match sender_class {
        SenderClass::Operator => "Events <events@riverinn.example>".to_string(),
        SenderClass::External => "Guest <guest@mail.example>".to_string(),
    };

    Message {
        message_id: message_id.to_string(),
        thread_id: thread_id.to_string(),
        sent_at: epoch() + Duration::minutes(minutes),
        sender_class,
        subject: format!("Subject {message_id}"),
        raw_snippet: body.chars().take(60).collect(),
        from_header,
        body_text: body.to_string(),
    }
}

pub fn record_at(
    message_id: &str,
    thread_id: &str,
    minutes: i64,
    vector: Vec<f32>,
) -> EmbeddingRecord {
    EmbeddingRecord {
        message_id: message_id.to_string(),
        thread_id: thread_id.to_string(),
        sent_at: epoch() + Duration::minutes(minutes),
        vector,
        model_id: "test-hash-embed".to_string(),
    }
}

pub fn raw_message(
    message_id: &str,
    date: &str,
    from: &str,
    subject: &str,
    body: &str,
) -> RawMessage {
    RawMessage {
        headers: vec![
            ("Message-ID".to_string(), message_id.to_string()),
            ("Date".to_string(), date.to_string()),
            ("From".to_string(), from.to_string()),
            ("Subject".to_string(), subject.to_string()),
        ],
        snippet: body.chars().take(80).collect(),
        payload: PayloadNode::Leaf(body.as_bytes().to_vec()),
    }
}

pub fn thread(thread_id: &str, messages: Vec<RawMessage>) -> MailThread {
    MailThread {
        thread_id: thread_id.to_string(),
        messages,
    }
}

/// Bag-of-words hashing embedder: each token lands on a deterministic
/// axis, so texts sharing words get genuinely similar vectors.
pub struct HashEmbedder {
    dimension: usize,
    fail_on: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_id(&self) -> &str {
        "test-hash-embed"
    }

    async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(true)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(marker) = &self.fail_on {
                if input.contains(marker.as_str()) {
                    return Err(PipelineError::Provider(
                        "scripted embedding failure".to_string(),
                    ));
                }
            }
            out.push(hash_embed(input, self.dimension));
        }
        Ok(out)
    }
}

pub fn hash_embedder(config: &PipelineConfig) -> Arc<HashEmbedder> {
    Arc::new(HashEmbedder {
        dimension: config.embedding_dimension,
        fail_on: None,
    })
}

/// Embedder that errors on any input containing `marker`.
pub fn failing_embedder(config: &PipelineConfig, marker: &str) -> Arc<HashEmbedder> {
    Arc::new(HashEmbedder {
        dimension: config.embedding_dimension,
        fail_on: Some(marker.to_string()),
    })
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dimension];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % dimension as u64) as usize] += 1.0;
    }
    vector
}

pub struct StaticCompleter {
    reply: String,
}

#[async_trait]
impl CompletionProvider for StaticCompleter {
    async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(true)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, PipelineError> {
        Ok(self.reply.clone())
    }
}

pub fn static_completer(reply: &str) -> Arc<dyn CompletionProvider> {
    Arc::new(StaticCompleter {
        reply: reply.to_string(),
    })
}

pub struct FailingCompleter {
    reason: String,
}

#[async_trait]
impl CompletionProvider for FailingCompleter {
    async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(true)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, PipelineError> {
        Err(PipelineError::Provider(self.reason.clone()))
    }
}

pub fn failing_completer(reason: &str) -> Arc<dyn CompletionProvider> {
    Arc::new(FailingCompleter {
        reason: reason.to_string(),
    })
}

/// Completer whose health check reports unreachable.
pub struct OfflineCompleter;

#[async_trait]
impl CompletionProvider for OfflineCompleter {
    async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(false)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, PipelineError> {
        Err(PipelineError::Provider("offline".to_string()))
    }
}

pub fn offline_completer() -> Arc<dyn CompletionProvider> {
    Arc::new(OfflineCompleter)
}

pub struct StaticMailSource {
    threads: Vec<MailThread>,
}

#[async_trait]
impl MailSource for StaticMailSource {
    async fn list_recent_threads(&self) -> Result<Vec<ThreadRef>, PipelineError> {
        Ok(self
            .threads
            .iter()
            .map(|t| ThreadRef {
                thread_id: t.thread_id.clone(),
            })
            .collect())
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<MailThread, PipelineError> {
        self.threads
            .iter()
            .find(|t| t.thread_id == thread_id)
            .cloned()
            .ok_or_else(|| PipelineError::BadRequest(format!("unknown thread: {thread_id}")))
    }
}

pub fn static_source(threads: Vec<MailThread>) -> Arc<dyn MailSource> {
    Arc::new(StaticMailSource { threads })
}

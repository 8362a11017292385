//! Incremental guest-email embedding and retrieval pipeline.
//!
//! Ingests email threads into a deduplicated message store, keeps a
//! vector index over their normalized bodies in sync, detects which
//! conversation threads are still waiting on an operator reply, and
//! drafts grounded responses from similar past conversations via an
//! external completion model. Drafts are staged for review, never sent.
//!
//! Everything runs as single-process batch sweeps invoked by the caller;
//! stores and model providers are constructed once and injected.

pub mod core;
pub mod llm;
pub mod logging;
pub mod mail;
pub mod rag;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use crate::core::config::{PipelineConfig, StorePaths};
pub use crate::core::errors::PipelineError;
pub use crate::llm::{CompletionProvider, EmbeddingProvider, OpenAiCompatProvider};
pub use crate::mail::{
    migrate_sender_classes, IngestReport, Ingestor, MailSource, MailThread, Message,
    MigrationReport, PayloadNode, RawMessage, SenderClass, ThreadRef,
};
pub use crate::rag::{
    DraftOutcome, EmbeddingIndexer, ProcessedThread, ResponsePipeline, ScoredMessage,
    SimilarityRetriever, SyncReport, UnansweredDetector,
};
pub use crate::store::{EmbeddingRecord, EmbeddingStore, MessageStore, StoreStats};

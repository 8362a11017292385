//! Retrieval-augmented reply drafting.
//!
//! - `indexer`: incremental embedding sync over stored messages
//! - `detector`: which threads are waiting on an operator reply
//! - `retriever`: thread-diverse semantic nearest-neighbor search
//! - `context_builder`: grounding-prompt assembly
//! - `responder`: the orchestrating pipeline

pub mod context_builder;
pub mod detector;
pub mod indexer;
pub mod responder;
pub mod retriever;

pub use context_builder::ContextBuilder;
pub use detector::UnansweredDetector;
pub use indexer::{EmbeddingIndexer, SyncReport};
pub use responder::{DraftOutcome, MatchRef, ProcessedThread, ResponsePipeline};
pub use retriever::{ScoredMessage, SimilarityRetriever};

/// Hard cut at `max_chars`, no boundary smarts; keeps embedding inputs
/// inside the model's limits.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

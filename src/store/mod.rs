//! SQLite persistence: one collection for messages, one for embeddings.
//!
//! The two stores live in separate database files so a corrupt embedding
//! index never blocks message reads; cross-store consistency is by
//! `message_id` convention, not foreign keys.

pub mod embeddings;
pub mod messages;

pub use embeddings::{EmbeddingHit, EmbeddingRecord, EmbeddingStore};
pub use messages::{MessageStore, StoreStats};

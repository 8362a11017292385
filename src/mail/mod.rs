//! Email domain layer: message types, payload normalization, ingestion.
//!
//! - `message`: the stored record and sender classification
//! - `payload`: raw provider payload trees and the `MailSource` seam
//! - `normalize`: payload tree to clean plain text
//! - `ingest`: the collection sweep
//! - `migrate`: sender-class reclassification

pub mod ingest;
pub mod message;
pub mod migrate;
pub mod normalize;
pub mod payload;

pub use ingest::{IngestReport, Ingestor};
pub use message::{classify, Message, SenderClass};
pub use migrate::{migrate_sender_classes, MigrationReport};
pub use normalize::normalize;
pub use payload::{MailSource, MailThread, PayloadNode, RawMessage, ThreadRef};

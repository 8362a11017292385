//! Raw message payloads and the external mail-source seam.

use async_trait::async_trait;

use crate::core::errors::PipelineError;

/// A (possibly nested) multi-part message body as handed over by the
/// mail provider: either a leaf part carrying decoded body bytes, or a
/// container of sub-parts.
#[derive(Debug, Clone)]
pub enum PayloadNode {
    Leaf(Vec<u8>),
    Multipart(Vec<PayloadNode>),
}

/// A message as it arrives from the provider, before normalization.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub headers: Vec<(String, String)>,
    pub snippet: String,
    pub payload: PayloadNode,
}

impl RawMessage {
    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ThreadRef {
    pub thread_id: String,
}

#[derive(Debug, Clone)]
pub struct MailThread {
    pub thread_id: String,
    pub messages: Vec<RawMessage>,
}

/// External message source: the provider-API half of ingestion lives
/// behind this trait (listing, fetching, auth are the caller's problem).
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn list_recent_threads(&self) -> Result<Vec<ThreadRef>, PipelineError>;

    async fn fetch_thread(&self, thread_id: &str) -> Result<MailThread, PipelineError>;
}

//! Thread-diverse similarity retrieval.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::llm::EmbeddingProvider;
use crate::mail::Message;
use crate::store::{EmbeddingStore, MessageStore};

use super::truncate_chars;

/// A retrieved message with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub message: Message,
    pub score: f32,
}

pub struct SimilarityRetriever {
    messages: MessageStore,
    embeddings: EmbeddingStore,
    embedder: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
}

impl SimilarityRetriever {
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

    /// Top-`k` most similar historical messages, at most one per thread.
    ///
    /// Fetches `k × overfetch` raw candidates and keeps the best-ranked
    /// hit from each thread; a plain top-k would be dominated by whichever
    /// thread happens to be verbose. Zero results is a valid outcome the
    /// caller must handle as "no grounding available".
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<ScoredMessage>, PipelineError> {
        if k == 0 || query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let input = truncate_chars(query_text, self.config.embed_input_max_chars);
        let query = self
            .embedder
            .embed(&[input])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Provider("embedder returned no vector".to_string()))?;

        let raw_limit = k * self.config.diversify_overfetch.max(1);
        let candidates = self.embeddings.search(&query, raw_limit).await?;
        debug!(candidates = candidates.len(), "similarity candidates fetched");

        let mut seen_threads: HashSet<String> = HashSet::new();
        let mut kept = Vec::new();

        for hit in candidates {
            if kept.len() >= k {
                break;
            }
            if !seen_threads.insert(hit.thread_id.clone()) {
                continue;
            }

            // An embedding without its message means the stores diverged;
            // skip the hit rather than fail the retrieval.
            let Some(message) = self.messages.get(&hit.message_id).await? else {
                debug!(message_id = %hit.message_id, "embedding has no stored message");
                continue;
            };

            kept.push(ScoredMessage {
                message,
                score: hit.score,
            });
        }

        info!(matches = kept.len(), requested = k, "retrieval finished");
        Ok(kept)
    }
}

//! Reply-draft orchestration.
//!
//! Each unanswered thread moves through retrieval, grounding, and
//! generation in turn. A thread with no retrieval matches terminates as
//! `NoContext` and the generation capability is never called for it;
//! provider errors terminate that thread as `Failed` without touching the
//! rest of the batch. Drafts are returned for operator review, never sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::llm::{CompletionProvider, CompletionRequest, EmbeddingProvider};
use crate::mail::Message;
use crate::store::{EmbeddingStore, MessageStore};

use super::context_builder::ContextBuilder;
use super::detector::UnansweredDetector;
use super::retriever::{ScoredMessage, SimilarityRetriever};

/// A retrieval match reference kept for audit alongside the draft.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRef {
    pub thread_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DraftOutcome {
    Generated {
        draft: String,
        matches: Vec<MatchRef>,
    },
    NoContext,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedThread {
    pub thread_id: String,
    pub message_id: String,
    pub subject: String,
    pub outcome: DraftOutcome,
}

pub struct ResponsePipeline {
    detector: UnansweredDetector,
    retriever: SimilarityRetriever,
    context: ContextBuilder,
    messages: MessageStore,
    embeddings: EmbeddingStore,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    config: PipelineConfig,
}

impl ResponsePipeline {
    pub fn new(
        messages: MessageStore,
        embeddings: EmbeddingStore,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector: UnansweredDetector::new(messages.clone()),
            retriever: SimilarityRetriever::new(
                messages.clone(),
                embeddings.clone(),
                embedder.clone(),
                config.clone(),
            ),
            context: ContextBuilder::new(messages.clone(), config.clone()),
            messages,
            embeddings,
            embedder,
            completer,
            config,
        }
    }

    /// Fail fast when the stores or the model providers are unreachable;
    /// there is no degraded mode without them.
    pub async fn health_check(&self) -> Result<(), PipelineError> {
        self.messages.count().await?;
        self.embeddings.count().await?;

        if !self.embedder.health_check().await? {
            return Err(PipelineError::Config(
                "embedding provider is unreachable".to_string(),
            ));
        }
        if !self.completer.health_check().await? {
            return Err(PipelineError::Config(
                "completion provider is unreachable".to_string(),
            ));
        }
        Ok(())
    }

    /// Find unanswered threads and draft a grounded reply for each.
    pub async fn process_unanswered(
        &self,
        since: DateTime<Utc>,
        limit: usize,
        k_similar: usize,
    ) -> Result<Vec<ProcessedThread>, PipelineError> {
        let unanswered = self.detector.find_unanswered(since, limit).await?;
        if unanswered.is_empty() {
            info!("no unanswered threads found");
            return Ok(Vec::new());
        }

        info!(threads = unanswered.len(), "drafting replies");
        let mut processed = Vec::with_capacity(unanswered.len());

        for head in unanswered {
            let outcome = self.draft_reply(&head, k_similar).await;
            match &outcome {
                DraftOutcome::Generated { matches, .. } => {
                    info!(
                        thread_id = %head.thread_id,
                        matches = matches.len(),
                        "draft generated"
                    );
                }
                DraftOutcome::NoContext => {
                    info!(thread_id = %head.thread_id, "no grounding context available");
                }
                DraftOutcome::Failed { reason } => {
                    warn!(thread_id = %head.thread_id, "draft failed: {reason}");
                }
            }

            processed.push(ProcessedThread {
                thread_id: head.thread_id.clone(),
                message_id: head.message_id.clone(),
                subject: head.subject.clone(),
                outcome,
            });
        }

        Ok(processed)
    }

    async fn draft_reply(&self, head: &Message, k_similar: usize) -> DraftOutcome {
        debug!(thread_id = %head.thread_id, "retrieving similar conversations");
        let matches = match self.retriever.retrieve(&head.body_text, k_similar).await {
            Ok(matches) => matches,
            Err(err) => {
                return DraftOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        if matches.is_empty() {
            return DraftOutcome::NoContext;
        }

        debug!(thread_id = %head.thread_id, matches = matches.len(), "grounding context ready");
        let prompt = match self.context.build_context(&head.body_text, &matches).await {
            Ok(prompt) => prompt,
            Err(err) => {
                return DraftOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        let request = CompletionRequest::user(prompt)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        match self.completer.complete(request).await {
            Ok(draft) => DraftOutcome::Generated {
                draft,
                matches: matches.iter().map(match_ref).collect(),
            },
            Err(err) => DraftOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}

fn match_ref(scored: &ScoredMessage) -> MatchRef {
    MatchRef {
        thread_id: scored.message.thread_id.clone(),
        score: scored.score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::SenderClass;
    use crate::rag::indexer::EmbeddingIndexer;
    use crate::testutil::{
        embedding_store, epoch, failing_completer, hash_embedder, message_at, message_store,
        static_completer, test_config,
    };

    async fn seeded_pipeline(
        completer: Arc<dyn CompletionProvider>,
        index: bool,
    ) -> (ResponsePipeline, MessageStore) {
        let messages = message_store().await;
        let embeddings = embedding_store().await;
        let config = test_config();

        for (id, minutes, class, body) in [
            ("m1", 0, SenderClass::External, "Looking for a wedding date in June"),
            ("m2", 10, SenderClass::Operator, "We have June 14 open"),
            ("m3", 20, SenderClass::External, "Great, what's the catering minimum?"),
        ] {
            messages
                .upsert(&message_at(id, "t1", minutes, class, body))
                .await
                .unwrap();
        }

        if index {
            EmbeddingIndexer::new(
                messages.clone(),
                embeddings.clone(),
                hash_embedder(&config),
                config.clone(),
            )
            .sync(50)
            .await
            .unwrap();
        }

        let pipeline = ResponsePipeline::new(
            messages.clone(),
            embeddings,
            hash_embedder(&config),
            completer,
            config,
        );
        (pipeline, messages)
    }

    #[tokio::test]
    async fn end_to_end_draft_for_unanswered_thread() {
        let (pipeline, _messages) =
            seeded_pipeline(static_completer("Happy to help with catering!"), true).await;

        let processed = pipeline.process_unanswered(epoch(), 5, 3).await.unwrap();
        assert_eq!(processed.len(), 1);

        let thread = &processed[0];
        assert_eq!(thread.thread_id, "t1");
        assert_eq!(thread.message_id, "m3");

        match &thread.outcome {
            DraftOutcome::Generated { draft, matches } => {
                assert_eq!(draft, "Happy to help with catering!");
                assert!(!matches.is_empty());
                assert_eq!(matches[0].thread_id, "t1");
            }
            other => panic!("expected Generated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_index_terminates_as_no_context_without_generation() {
        // If the generator were called, this completer would turn the
        // outcome into Failed; asserting NoContext proves it stayed cold.
        let (pipeline, _messages) =
            seeded_pipeline(failing_completer("generator must not be called"), false).await;

        let processed = pipeline.process_unanswered(epoch(), 5, 3).await.unwrap();
        assert_eq!(processed.len(), 1);
        assert!(matches!(processed[0].outcome, DraftOutcome::NoContext));
    }

    #[tokio::test]
    async fn completion_failure_marks_only_that_thread_failed() {
        let (pipeline, messages) = seeded_pipeline(failing_completer("model offline"), true).await;

        // Second unanswered thread; both still get a terminal outcome.
        messages
            .upsert(&message_at(
                "m4",
                "t2",
                30,
                SenderClass::External,
                "Is the June garden available for ceremonies?",
            ))
            .await
            .unwrap();

        let processed = pipeline.process_unanswered(epoch(), 5, 3).await.unwrap();
        assert_eq!(processed.len(), 2);
        for thread in &processed {
            match &thread.outcome {
                DraftOutcome::Failed { reason } => assert!(reason.contains("model offline")),
                DraftOutcome::NoContext => {}
                DraftOutcome::Generated { .. } => panic!("completer cannot generate"),
            }
        }
        assert!(processed
            .iter()
            .any(|t| matches!(t.outcome, DraftOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn answered_store_produces_no_work() {
        let (pipeline, messages) =
            seeded_pipeline(static_completer("unused"), true).await;

        messages
            .upsert(&message_at(
                "m5",
                "t1",
                40,
                SenderClass::Operator,
                "The catering minimum is $2,000.",
            ))
            .await
            .unwrap();

        let processed = pipeline.process_unanswered(epoch(), 5, 3).await.unwrap();
        assert!(processed.is_empty());
    }

    #[tokio::test]
    async fn health_check_passes_with_reachable_fakes() {
        let (pipeline, _messages) = seeded_pipeline(static_completer("ok"), false).await;
        pipeline.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_fails_when_a_provider_is_unreachable() {
        let (pipeline, _messages) =
            seeded_pipeline(crate::testutil::offline_completer(), false).await;

        let err = pipeline.health_check().await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}

//! Unanswered-thread detection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::errors::PipelineError;
use crate::mail::{Message, SenderClass};
use crate::store::MessageStore;

pub struct UnansweredDetector {
    store: MessageStore,
}

impl UnansweredDetector {
    pub fn new(store: MessageStore) -> Self {
        Self { store }
    }

    /// Threads whose head is an external message, i.e. the guest spoke
    /// last and is waiting on a reply. Returns each thread's head, newest
    /// activity first, at most `limit` threads; each thread is considered
    /// once per call no matter how many recent external messages it holds.
    pub async fn find_unanswered(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Message>, PipelineError> {
        let recent = self.store.find_external_since(since).await?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut heads = Vec::new();

        for message in recent {
            if heads.len() >= limit {
                break;
            }
            if !visited.insert(message.thread_id.clone()) {
                continue;
            }

            let Some(head) = self.store.latest_by_thread(&message.thread_id).await? else {
                continue;
            };

            if head.sender_class == SenderClass::External {
                debug!(thread_id = %head.thread_id, subject = %head.subject, "unanswered thread");
                heads.push(head);
            }
        }

        info!(
            candidates = visited.len(),
            unanswered = heads.len(),
            "unanswered scan finished"
        );
        Ok(heads)
    }
}

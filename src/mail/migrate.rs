//! Sender-class reclassification sweep.
//!
//! The classification rule has changed over the system's life; stored
//! classes are a projection of `from_header`, so this sweep recomputes
//! them and rewrites only the rows that disagree. Idempotent: a second
//! pass under the same rule updates nothing.

use tracing::info;

use crate::core::errors::PipelineError;
use crate::store::MessageStore;

use super::message::classify;

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub scanned: usize,
    pub updated: usize,
}

pub async fn migrate_sender_classes(
    store: &MessageStore,
    operator_domain: &str,
    dry_run: bool,
) -> Result<MigrationReport, PipelineError> {
    let mut report = MigrationReport::default();

    let messages = store.all_chronological().await?;
    for message in &messages {
        report.scanned += 1;

        let fresh = classify(&message.from_header, operator_domain);
        if fresh == message.sender_class {
            continue;
        }

        info!(
            message_id = %message.message_id,
            from = %message.from_header,
            new_class = fresh.as_str(),
            dry_run,
            "sender class changed under current rule"
        );
        if !dry_run {
            store.set_sender_class(&message.message_id, fresh).await?;
        }
        report.updated += 1;
    }

    info!(
        scanned = report.scanned,
        updated = report.updated,
        dry_run,
        "sender migration finished"
    );
    Ok(report)
}

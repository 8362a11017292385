//! Message domain types and sender classification.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which side of the conversation a message came from.
///
/// Derived from the From header by [`classify`]; a projection of stored
/// data, not a source of truth, so it can be recomputed at any time (see
/// `mail::migrate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderClass {
    Operator,
    External,
}

impl SenderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderClass::Operator => "operator",
            SenderClass::External => "external",
        }
    }

    /// Human-facing label used when rendering conversations into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            SenderClass::Operator => "Operator",
            SenderClass::External => "Guest",
        }
    }

    /// Unknown stored values read back as `External`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "operator" => SenderClass::Operator,
            _ => SenderClass::External,
        }
    }
}

/// One physical email message. `message_id` is the natural key; records
/// are write-once apart from sender-class reclassification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub thread_id: String,
    pub sent_at: DateTime<Utc>,
    pub sender_class: SenderClass,
    pub subject: String,
    pub raw_snippet: String,
    pub from_header: String,
    /// Normalized plain text. Empty bodies are never stored.
    pub body_text: String,
}

static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();

fn address_re() -> &'static Regex {
    // Handles "Name <addr@host>" as well as bare addresses.
    ADDRESS_RE.get_or_init(|| {
        Regex::new(r"<([^>]+)>|([^\s<>]+@[^\s<>]+)").expect("address pattern is valid")
    })
}

/// Pure sender classification: operator-domain match over the From header.
///
/// Empty or unparseable headers classify as `External`.
pub fn classify(from_header: &str, operator_domain: &str) -> SenderClass {
    if from_header.trim().is_empty() {
        return SenderClass::External;
    }

    let Some(caps) = address_re().captures(from_header) else {
        return SenderClass::External;
    };

    let address = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or("");

    let needle = format!("@{}", operator_domain.trim_start_matches('@').to_lowercase());
    if address.to_lowercase().contains(&needle) {
        SenderClass::Operator
    } else {
        SenderClass::External
    }
}

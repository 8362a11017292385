//! Pipeline configuration and on-disk layout.
//!
//! All tunables are plain data injected at construction time. Nothing in
//! the crate reads ambient configuration or environment state.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tunables for the embedding and retrieval pipeline.
///
/// The over-fetch factor and the quoted-reply markers are heuristics
/// carried over from operational use; they are configurable rather than
/// hardcoded and should not be assumed optimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Domain whose senders are classified as `Operator` (e.g. "riverinn.example").
    pub operator_domain: String,
    /// Identifier of the embedding model; stored with every vector.
    pub embedding_model_id: String,
    /// Expected embedding vector length.
    pub embedding_dimension: usize,
    /// Identifier of the completion model used for reply drafting.
    pub completion_model_id: String,
    /// Bulk-insert size for the embedding sync sweep.
    pub batch_size: usize,
    /// Hard cut applied to text before it is sent for embedding.
    pub embed_input_max_chars: usize,
    /// Per-message cut when rendering example conversations into a prompt.
    pub context_snippet_max_chars: usize,
    /// Raw candidates fetched per requested result before thread diversification.
    pub diversify_overfetch: usize,
    /// Line prefixes that mark the start of quoted reply history.
    pub quote_markers: Vec<String>,
    /// Sampling temperature for reply drafting.
    pub temperature: f64,
    /// Completion token budget for reply drafting.
    pub max_tokens: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            operator_domain: "riverinn.example".to_string(),
            embedding_model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            embedding_dimension: 384,
            completion_model_id: "gpt-35-turbo".to_string(),
            batch_size: 50,
            embed_input_max_chars: 500,
            context_snippet_max_chars: 300,
            diversify_overfetch: 3,
            quote_markers: default_quote_markers(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// The seven `"On <Day>,"` prefixes mail clients put above quoted history.
pub fn default_quote_markers() -> Vec<String> {
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .map(|day| format!("On {day},"))
        .collect()
}

/// Filesystem layout for the two stores and the log directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub messages_db_path: PathBuf,
    pub embeddings_db_path: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let log_dir = data_dir.join("logs");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        let messages_db_path = data_dir.join("messages.db");
        let embeddings_db_path = data_dir.join("embeddings.db");

        StorePaths {
            data_dir,
            log_dir,
            messages_db_path,
            embeddings_db_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_cover_every_weekday() {
        let markers = default_quote_markers();
        assert_eq!(markers.len(), 7);
        assert!(markers.contains(&"On Mon,".to_string()));
        assert!(markers.contains(&"On Sun,".to_string()));
    }
}

//! Grounding-prompt assembly.
//!
//! Reconstructs the full conversation behind each retrieved match and
//! renders everything into a single prompt. That prompt is the only thing
//! the generation capability ever sees; no other state crosses the seam.

use std::fmt::Write as _;

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::store::MessageStore;

use super::retriever::ScoredMessage;

const PREAMBLE: &str = "You are responding on behalf of the property's events team \
to a guest inquiry about stays, weddings, or events.";

const CLOSING_INSTRUCTIONS: &str = "INSTRUCTIONS:
1. Respond as the events team in a warm, professional, and helpful manner
2. Use the communication style and tone from the example conversations above
3. Address the guest's specific questions or requests
4. Provide relevant information about the property's event services
5. Include appropriate next steps for the guest
6. Keep the response concise but comprehensive
7. Match the level of formality used in similar past responses

Draft a reply the team could send after review:";

pub struct ContextBuilder {
    store: MessageStore,
    config: PipelineConfig,
}

impl ContextBuilder {
    pub fn new(store: MessageStore, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Render the query plus one example block per match, each block the
    /// match's full thread in chronological order labeled by sender class.
    pub async fn build_context(
        &self,
        query_text: &str,
        matches: &[ScoredMessage],
    ) -> Result<String, PipelineError> {
        let mut context = String::new();

        context.push_str(PREAMBLE);
        let _ = write!(
            context,
            "\n\nGUEST'S CURRENT MESSAGE:\n{query_text}\n\n\
             SIMILAR PAST CONVERSATIONS FOR REFERENCE:\n\
             Use these examples to understand the team's communication style and how \
             similar inquiries are usually handled:\n"
        );

        for (i, scored) in matches.iter().enumerate() {
            let conversation = self.store.find_by_thread(&scored.message.thread_id).await?;
            if conversation.is_empty() {
                continue;
            }

            let _ = write!(
                context,
                "\n--- EXAMPLE CONVERSATION {} (similarity: {:.3}) ---\n",
                i + 1,
                scored.score
            );

            for message in conversation {
                let body = snippet(&message.body_text, self.config.context_snippet_max_chars);
                let _ = writeln!(context, "{}: {}", message.sender_class.label(), body);
            }
        }

        context.push('\n');
        context.push_str(CLOSING_INSTRUCTIONS);
        Ok(context)
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

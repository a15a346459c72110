//! Prompt assembly.

use crate::config::{PromptVariant, Prompts};
use crate::vector_store::SearchResult;
use std::collections::HashMap;

/// Substituted for a query or sensor block that was not given.
pub const NOT_PROVIDED: &str = "Not provided";

/// Join retrieved record texts with newlines and keep the first `limit` characters.
///
/// The cut counts characters, not bytes, and ignores word boundaries.
pub fn build_context(results: &[SearchResult], limit: usize) -> String {
    let joined = results
        .iter()
        .map(|r| r.document.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    match joined.char_indices().nth(limit) {
        Some((byte_idx, _)) => joined[..byte_idx].to_string(),
        None => joined,
    }
}

fn or_not_provided(text: &str) -> String {
    if text.trim().is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        text.to_string()
    }
}

/// Fills the configured template with context and user input.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    prompts: Prompts,
    variant: PromptVariant,
    context_chars: usize,
}

impl PromptAssembler {
    pub fn new(prompts: Prompts, variant: PromptVariant, context_chars: usize) -> Self {
        Self {
            prompts,
            variant,
            context_chars,
        }
    }

    pub fn variant(&self) -> PromptVariant {
        self.variant
    }

    /// Build the prompt for one turn. User text is inserted as given.
    pub fn assemble(&self, results: &[SearchResult], query: &str, sensor_data: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "context".to_string(),
            build_context(results, self.context_chars),
        );
        vars.insert("sensor_data".to_string(), or_not_provided(sensor_data));
        vars.insert("query".to_string(), or_not_provided(query));

        self.prompts
            .render_with_custom(self.prompts.rag.template(self.variant), &vars)
    }
}

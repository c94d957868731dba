//! Secondary check for entity-only categories, delegated to the generation backend.
//!
//! Parse failure, backend failure and a `false` answer are all the same
//! outcome here: the word is not verified.

use tracing::debug;

use crate::backend::{BackendOutcome, GenerationBackend};
use crate::secret::parser::parse_json_object;
use crate::secret::prompts::build_semantic_prompt;

const VERIFY_MAX_TOKENS: u32 = 32;

/// True only when the backend explicitly answers `{"ok": true}`.
pub async fn verify_entity(backend: &dyn GenerationBackend, category: &str, word: &str) -> bool {
    let prompt = build_semantic_prompt(category, word);
    let raw = match backend.generate(&prompt, VERIFY_MAX_TOKENS).await {
        BackendOutcome::Completed(raw) => raw,
        other => {
            debug!("Semantic check for '{word}' got no answer: {other:?}");
            return false;
        }
    };

    parse_json_object(&raw)
        .ok()
        .and_then(|map| map.get("ok").and_then(|v| v.as_bool()))
        .unwrap_or(false)
}

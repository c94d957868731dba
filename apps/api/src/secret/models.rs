//! Data model for the secret-word pipeline.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::secret::category::CategorySet;

/// Language tag carried by every secret. The game, prompts and fallback pool are Spanish.
pub const LANGUAGE: &str = "es";

/// How obscure the secret word should be. Only steers the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

/// The record handed to the game session: one category, one word, three hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub language: String,
    pub category: String,
    pub word: String,
    pub difficulty: Difficulty,
    pub hints: Vec<String>,
}

/// Raw fields pulled out of generator output, before any validation.
/// Missing or non-string fields are carried as empty strings so the
/// lexical checks report them instead of the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretCandidate {
    pub category: String,
    pub word: String,
    pub hints: Vec<String>,
}

/// A sanitized generation request. The ledger is caller-owned and read-only here.
#[derive(Debug, Clone)]
pub struct SecretRequest {
    pub categories: CategorySet,
    pub difficulty: Difficulty,
    pub used_words: Vec<String>,
}

/// Symbolic reason an attempt was rejected.
///
/// Codes stay symbolic everywhere except the prompt builder, which renders
/// them to natural language for the corrective clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    CategoryNotSelected,
    WordLength,
    WordFormat,
    WordRepeated,
    EntityNameRequired,
    HintsCount,
    HintLength,
    HintFormat,
    HintLeaksWord,
    JsonParseFailed,
    ModerationFlagged,
    SemanticCheckFailed,
    /// Backend answered with a non-success HTTP status.
    BackendError(u16),
    /// Backend reported a failure without an HTTP status (error envelope, job error event).
    BackendErrorReported,
    /// Transport-level failure, no response at all.
    BackendUnreachable,
    /// Job never reached a terminal state within the poll budget.
    BackendTimeout,
}

impl AttemptError {
    pub fn code(&self) -> Cow<'static, str> {
        let code = match self {
            AttemptError::CategoryNotSelected => "category_not_selected",
            AttemptError::WordLength => "word_length",
            AttemptError::WordFormat => "word_format",
            AttemptError::WordRepeated => "word_repeated",
            AttemptError::EntityNameRequired => "entity_name_required",
            AttemptError::HintsCount => "hints_count",
            AttemptError::HintLength => "hint_length",
            AttemptError::HintFormat => "hint_format",
            AttemptError::HintLeaksWord => "hint_leaks_word",
            AttemptError::JsonParseFailed => "json_parse_failed",
            AttemptError::ModerationFlagged => "moderation_flagged",
            AttemptError::SemanticCheckFailed => "semantic_check_failed",
            AttemptError::BackendError(status) => {
                return Cow::Owned(format!("backend_error_{status}"))
            }
            AttemptError::BackendErrorReported => "backend_error_reported",
            AttemptError::BackendUnreachable => "backend_unreachable",
            AttemptError::BackendTimeout => "backend_timeout",
        };
        Cow::Borrowed(code)
    }

    /// True for failures of the backend itself rather than of the candidate it produced.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            AttemptError::BackendError(_)
                | AttemptError::BackendErrorReported
                | AttemptError::BackendUnreachable
                | AttemptError::BackendTimeout
        )
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl Serialize for AttemptError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

/// Joins codes for log lines: `word_repeated, hint_leaks_word`.
pub fn join_codes(errors: &[AttemptError]) -> String {
    errors
        .iter()
        .map(|e| e.code())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One pass through prompt → generate → parse → validate. Lives for a single
/// orchestrator iteration; only its `errors` survive, as feedback.
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub attempt_index: u32,
    pub prompt: String,
    pub raw_output: String,
    pub candidate: Option<SecretCandidate>,
    pub errors: Vec<AttemptError>,
}

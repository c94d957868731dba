//! Deterministic structural checks on a parsed candidate.
//!
//! Every check runs; codes accumulate in a fixed order and each code appears
//! at most once. An empty result means the candidate is structurally valid.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::secret::category::CategorySet;
use crate::secret::models::{AttemptError, SecretCandidate};
use crate::secret::normalize::{fold, ledger_key};
use crate::secret::rules::CategoryRules;

pub const WORD_MIN_CHARS: usize = 3;
pub const WORD_MAX_CHARS: usize = 32;
pub const HINT_COUNT: usize = 3;
pub const HINT_MIN_CHARS: usize = 2;
pub const HINT_MAX_CHARS: usize = 28;
/// Word tokens shorter than this are ignored by the leak check.
pub const LEAK_TOKEN_MIN_CHARS: usize = 4;

/// One to three space-separated tokens of Spanish letters, any case.
static WORD_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-záéíóúüñ]+(?: [a-záéíóúüñ]+){0,2}$").unwrap());

/// One to four tokens, each starting with an uppercase letter.
static PROPER_NOUN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-ZÁÉÍÓÚÜÑ][a-záéíóúüñA-ZÁÉÍÓÚÜÑ]*(?: [A-ZÁÉÍÓÚÜÑ][a-záéíóúüñA-ZÁÉÍÓÚÜÑ]*){0,3}$")
        .unwrap()
});

/// Runs every lexical check against `candidate`.
pub fn validate_candidate(
    candidate: &SecretCandidate,
    categories: &CategorySet,
    used_words: &[String],
    rules: &CategoryRules,
) -> Vec<AttemptError> {
    let mut errors = Vec::new();

    if categories.find(&candidate.category).is_none() {
        push_unique(&mut errors, AttemptError::CategoryNotSelected);
    }

    let word = candidate.word.trim();
    if !char_len_within(word, WORD_MIN_CHARS, WORD_MAX_CHARS) {
        push_unique(&mut errors, AttemptError::WordLength);
    }
    if !WORD_SHAPE.is_match(word) {
        push_unique(&mut errors, AttemptError::WordFormat);
    }

    let ledger: HashSet<String> = used_words.iter().map(|w| ledger_key(w)).collect();
    if !word.is_empty() && ledger.contains(&ledger_key(word)) {
        push_unique(&mut errors, AttemptError::WordRepeated);
    }

    if let Some(rule) = rules.entity_rule_for(&candidate.category) {
        let all_lowercase = word == word.to_lowercase();
        if !PROPER_NOUN_SHAPE.is_match(word) || all_lowercase || rule.is_generic(word) {
            push_unique(&mut errors, AttemptError::EntityNameRequired);
        }
    }

    if candidate.hints.len() != HINT_COUNT {
        push_unique(&mut errors, AttemptError::HintsCount);
    }
    for hint in candidate.hints.iter().map(|h| h.trim()) {
        if !char_len_within(hint, HINT_MIN_CHARS, HINT_MAX_CHARS) {
            push_unique(&mut errors, AttemptError::HintLength);
        }
        if !WORD_SHAPE.is_match(hint) {
            push_unique(&mut errors, AttemptError::HintFormat);
        }
        if hint_leaks_word(word, hint) {
            push_unique(&mut errors, AttemptError::HintLeaksWord);
        }
    }

    errors
}

/// A hint leaks when, after folding, it contains any word token of at least
/// [`LEAK_TOKEN_MIN_CHARS`] characters as a substring. Partial containment
/// ("playas" for "playa") counts.
pub fn hint_leaks_word(word: &str, hint: &str) -> bool {
    let word = fold(word);
    let hint = fold(hint);
    word.split_whitespace()
        .filter(|token| token.chars().count() >= LEAK_TOKEN_MIN_CHARS)
        .any(|token| hint.contains(token))
}

fn char_len_within(text: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&text.chars().count())
}

fn push_unique(errors: &mut Vec<AttemptError>, error: AttemptError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}

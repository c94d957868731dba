//! Tolerant extraction of a JSON record from free-form generator text.
//!
//! The generator often wraps its JSON in prose or code fences. We take the
//! first balanced `{ ... }` span and parse only that. Nothing here panics or
//! returns a transport error: the result is a candidate or a symbolic code.

use serde_json::{Map, Value};

use crate::secret::models::{AttemptError, SecretCandidate};

/// Returns the first brace-balanced object span in `text`, starting at the
/// first `{`. `None` if there is no `{` or depth never returns to zero.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: usize = 0;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the first balanced object in `text` into a JSON map.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, AttemptError> {
    let span = extract_json_object(text).ok_or(AttemptError::JsonParseFailed)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(AttemptError::JsonParseFailed),
    }
}

/// Parses generator output into a [`SecretCandidate`].
///
/// A backend error envelope (`{"error": ..., "status": 503}`) in place of a
/// record yields the matching backend code instead of `json_parse_failed`.
pub fn parse_candidate(text: &str) -> Result<SecretCandidate, AttemptError> {
    let map = parse_json_object(text)?;

    if map.contains_key("error") && !map.contains_key("word") {
        let status = map
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());
        return Err(match status {
            Some(status) => AttemptError::BackendError(status),
            None => AttemptError::BackendErrorReported,
        });
    }

    let hints = match map.get("hints") {
        Some(Value::Array(items)) => items.iter().map(string_field).collect(),
        _ => Vec::new(),
    };

    Ok(SecretCandidate {
        category: map.get("category").map(string_field).unwrap_or_default(),
        word: map.get("word").map(string_field).unwrap_or_default(),
        hints,
    })
}

fn string_field(value: &Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_default()
}

//! Case and accent folding shared by the repeat check, the leak check and
//! the category rule registry.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases and strips diacritics via canonical decomposition:
/// `"Pingüino"` → `"pinguino"`, `"Señal"` → `"senal"`.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Comparison key for ledger entries: folded, whitespace collapsed.
pub fn ledger_key(text: &str) -> String {
    fold(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("Pingüino"), "pinguino");
        assert_eq!(fold("DELFÍN"), "delfin");
        assert_eq!(fold("Señal"), "senal");
    }

    #[test]
    fn test_fold_handles_precomposed_and_decomposed_input() {
        assert_eq!(fold("caf\u{e9}"), fold("cafe\u{301}"));
    }

    #[test]
    fn test_ledger_key_collapses_whitespace() {
        assert_eq!(ledger_key("  Camp   Nou "), "camp nou");
    }
}

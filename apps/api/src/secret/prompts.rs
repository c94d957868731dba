//! Prompt construction for the secret pipeline.
//!
//! Error codes are rendered to natural language here and nowhere else.
//! Output is fully determined by the inputs: no randomness, no clock.

use crate::secret::category::CategorySet;
use crate::secret::models::{AttemptError, Difficulty, LANGUAGE};
use crate::secret::rules::CategoryRules;

/// Only the most recent ledger entries are shown to the generator.
pub const LEDGER_PROMPT_WINDOW: usize = 50;

/// Secret generation prompt.
/// Replace: {categories_json}, {difficulty}, {difficulty_guidance}, {language},
///          {used_words_json}, {category_rules}, {feedback}
pub const SECRET_PROMPT_TEMPLATE: &str = r#"Genera UNA palabra secreta para el juego de deducción social "El Impostor".

CATEGORÍAS PERMITIDAS (elige exactamente una y cópiala LITERALMENTE en "category"):
{categories_json}

DIFICULTAD: {difficulty}. {difficulty_guidance}

PALABRAS YA USADAS (prohibido repetirlas, tampoco con otras mayúsculas o tildes):
{used_words_json}

Devuelve SOLO un objeto JSON con este esquema EXACTO:
{
  "language": "{language}",
  "category": "una de las categorías permitidas",
  "word": "la palabra secreta",
  "difficulty": "{difficulty}",
  "hints": ["pista uno", "pista dos", "pista tres"]
}

REGLAS:
1. "category" debe ser EXACTAMENTE una de las categorías permitidas, sin cambiar mayúsculas, tildes ni espacios.
2. "word" tiene entre 3 y 32 caracteres, de 1 a 3 palabras, solo letras (se admiten tildes, ü y ñ). Sin números ni signos.
3. "hints" contiene EXACTAMENTE 3 pistas; cada una tiene entre 2 y 28 caracteres, de 1 a 3 palabras, solo letras.
4. Las pistas son independientes: cada una por separado se relaciona con la palabra sin revelarla, y ninguna contiene la palabra ni una parte de ella.
5. Nada ofensivo, sexual, violento ni de odio.{category_rules}{feedback}"#;

/// Yes/no check that a word is a real instance of an entity-only category.
/// Replace: {category}, {word}
pub const SEMANTIC_PROMPT_TEMPLATE: &str = r#"¿Es "{word}" el nombre propio real de un ejemplo concreto y existente de la categoría "{category}"?
Un término genérico o solo relacionado con la categoría NO cuenta.

Responde SOLO con este JSON:
{"ok": true}
o
{"ok": false}"#;

/// Safety classification through the generation backend.
/// Replace: {text}
pub const MODERATION_PROMPT_TEMPLATE: &str = r#"Clasifica si el siguiente texto para un juego familiar contiene contenido sexual, violento, de odio, acoso, drogas o autolesiones.

TEXTO:
{text}

Responde SOLO con este JSON:
{"flagged": true}
o
{"flagged": false}"#;

/// Everything one secret prompt depends on.
pub struct PromptInput<'a> {
    pub categories: &'a CategorySet,
    pub difficulty: Difficulty,
    pub used_words: &'a [String],
    /// Codes from the previous attempt; empty on the first one.
    pub feedback: &'a [AttemptError],
    pub rules: &'a CategoryRules,
}

pub fn build_secret_prompt(input: &PromptInput<'_>) -> String {
    let categories: Vec<&str> = input.categories.iter().map(|c| c.as_str()).collect();
    let recent_start = input.used_words.len().saturating_sub(LEDGER_PROMPT_WINDOW);
    let recent_words = &input.used_words[recent_start..];

    // Caller-supplied ledger text goes in last so it can never be re-substituted.
    SECRET_PROMPT_TEMPLATE
        .replace("{categories_json}", &to_json_list(&categories))
        .replace("{difficulty_guidance}", difficulty_guidance(input.difficulty))
        .replace("{difficulty}", input.difficulty.as_str())
        .replace("{language}", LANGUAGE)
        .replace("{category_rules}", &render_category_rules(input))
        .replace("{feedback}", &render_feedback(input.feedback))
        .replace("{used_words_json}", &to_json_list(recent_words))
}

pub fn build_semantic_prompt(category: &str, word: &str) -> String {
    SEMANTIC_PROMPT_TEMPLATE
        .replace("{category}", category)
        .replace("{word}", word)
}

pub fn build_moderation_prompt(text: &str) -> String {
    MODERATION_PROMPT_TEMPLATE.replace("{text}", text)
}

fn difficulty_guidance(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Usa una palabra muy común y cotidiana que todo el mundo conozca.",
        Difficulty::Normal => "Usa una palabra conocida pero no la más obvia de la categoría.",
        Difficulty::Hard => "Usa una palabra concreta y menos frecuente, pero que un adulto reconozca.",
    }
}

fn render_category_rules(input: &PromptInput<'_>) -> String {
    let blocks: Vec<String> = input
        .rules
        .entity_categories(input.categories)
        .into_iter()
        .map(|(category, rule)| format!("- {}", rule.instruction_for(category.as_str())))
        .collect();
    if blocks.is_empty() {
        return String::new();
    }
    format!("\n\nREGLAS ESPECÍFICAS DE CATEGORÍA:\n{}", blocks.join("\n"))
}

/// Corrective clause naming every code verbatim, one explanation per code.
fn render_feedback(errors: &[AttemptError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let codes: Vec<String> = errors.iter().map(|e| e.code().into_owned()).collect();
    let lines: Vec<String> = errors
        .iter()
        .map(|e| format!("- {}: {}", e.code(), describe_error(e)))
        .collect();
    format!(
        "\n\nCORRECCIÓN: el intento anterior fue rechazado con los códigos [{}]. Corrígelo:\n{}",
        codes.join(", "),
        lines.join("\n")
    )
}

/// Natural-language fix for a rejection code.
pub fn describe_error(error: &AttemptError) -> &'static str {
    match error {
        AttemptError::CategoryNotSelected => {
            "\"category\" no era una de las categorías permitidas; cópiala literalmente."
        }
        AttemptError::WordLength => "\"word\" debe tener entre 3 y 32 caracteres.",
        AttemptError::WordFormat => "\"word\" debe ser de 1 a 3 palabras formadas solo por letras.",
        AttemptError::WordRepeated => "esa palabra ya se usó; elige otra distinta.",
        AttemptError::EntityNameRequired => {
            "\"word\" debe ser el nombre propio real de un ejemplo concreto, con mayúsculas iniciales, no un término genérico."
        }
        AttemptError::HintsCount => "\"hints\" debe tener exactamente 3 pistas.",
        AttemptError::HintLength => "cada pista debe tener entre 2 y 28 caracteres.",
        AttemptError::HintFormat => "cada pista debe ser de 1 a 3 palabras formadas solo por letras.",
        AttemptError::HintLeaksWord => "alguna pista contenía la palabra o parte de ella.",
        AttemptError::JsonParseFailed => "la respuesta no era un objeto JSON válido; devuelve solo el JSON.",
        AttemptError::ModerationFlagged => "el contenido se consideró inapropiado; elige algo apto para todos.",
        AttemptError::SemanticCheckFailed => {
            "la palabra no es un ejemplo real y concreto de la categoría elegida."
        }
        AttemptError::BackendError(_)
        | AttemptError::BackendErrorReported
        | AttemptError::BackendUnreachable
        | AttemptError::BackendTimeout => "el servicio falló; vuelve a intentarlo siguiendo todas las reglas.",
    }
}

fn to_json_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt_for(
        categories: &[&str],
        used: &[String],
        feedback: &[AttemptError],
    ) -> String {
        let set = CategorySet::from_raw(categories).unwrap();
        let rules = CategoryRules::default();
        build_secret_prompt(&PromptInput {
            categories: &set,
            difficulty: Difficulty::Normal,
            used_words: used,
            feedback,
            rules: &rules,
        })
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let used = vec!["playa".to_string()];
        let a = prompt_for(&["Lugares", "Comida"], &used, &[AttemptError::WordRepeated]);
        let b = prompt_for(&["Lugares", "Comida"], &used, &[AttemptError::WordRepeated]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_restates_category_and_hint_constraints() {
        let prompt = prompt_for(&["Lugares", "Comida"], &[], &[]);
        assert!(prompt.contains(r#"["Lugares","Comida"]"#));
        assert!(prompt.contains("EXACTAMENTE una de las categorías permitidas"));
        assert!(prompt.contains("Las pistas son independientes"));
        assert!(prompt.contains("DIFICULTAD: normal."));
        assert!(prompt.contains("\"language\": \"es\""));
    }

    #[test]
    fn test_no_leftover_placeholders() {
        let prompt = prompt_for(&["Estadios"], &[], &[AttemptError::HintsCount]);
        for placeholder in [
            "{categories_json}",
            "{used_words_json}",
            "{difficulty}",
            "{difficulty_guidance}",
            "{language}",
            "{category_rules}",
            "{feedback}",
            "{category}",
        ] {
            assert!(!prompt.contains(placeholder), "leftover {placeholder}");
        }
    }

    #[test]
    fn test_first_attempt_has_no_corrective_clause() {
        let prompt = prompt_for(&["Comida"], &[], &[]);
        assert!(!prompt.contains("CORRECCIÓN"));
    }

    #[test]
    fn test_feedback_names_codes_verbatim() {
        let prompt = prompt_for(
            &["Comida"],
            &[],
            &[AttemptError::WordRepeated, AttemptError::BackendError(503)],
        );
        assert!(prompt.contains("[word_repeated, backend_error_503]"));
        assert!(prompt.contains("- word_repeated: esa palabra ya se usó"));
    }

    #[test]
    fn test_entity_category_adds_proper_noun_instruction() {
        let prompt = prompt_for(&["Comida", "Estadios de fútbol"], &[], &[]);
        assert!(prompt.contains("REGLAS ESPECÍFICAS DE CATEGORÍA"));
        assert!(prompt.contains("\"Estadios de fútbol\""));
        assert!(prompt.contains("nombre propio real"));

        let plain = prompt_for(&["Comida"], &[], &[]);
        assert!(!plain.contains("REGLAS ESPECÍFICAS DE CATEGORÍA"));
    }

    #[test]
    fn test_only_recent_ledger_words_are_listed() {
        let used: Vec<String> = (0..60).map(|i| format!("palabra{i}")).collect();
        let prompt = prompt_for(&["Comida"], &used, &[]);
        assert!(!prompt.contains("\"palabra9\""));
        assert!(prompt.contains("\"palabra10\""));
        assert!(prompt.contains("\"palabra59\""));
    }

    #[test]
    fn test_ledger_text_is_not_substituted() {
        let used = vec!["{feedback}".to_string()];
        let prompt = prompt_for(&["Comida"], &used, &[AttemptError::WordRepeated]);
        assert!(prompt.contains(r#"["{feedback}"]"#));
    }

    #[test]
    fn test_semantic_prompt_mentions_word_and_category() {
        let prompt = build_semantic_prompt("Estadios", "Camp Nou");
        assert!(prompt.contains("\"Camp Nou\""));
        assert!(prompt.contains("\"Estadios\""));
    }
}

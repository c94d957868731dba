//! Registry of category-specific constraints.
//!
//! An entity-only category requires the word to be the real proper name of a
//! concrete instance (a specific stadium, not "estadio"). Adding a new one is
//! a matter of appending an [`EntityRule`]; the validator and the prompt
//! builder only ever go through [`CategoryRules`].

use crate::secret::category::{CategoryName, CategorySet};
use crate::secret::normalize::fold;

/// Constraint set attached to every category whose folded name contains one of `keywords`.
#[derive(Debug, Clone)]
pub struct EntityRule {
    pub name: &'static str,
    /// Folded substrings; `"estadio"` also covers `"Estadios de fútbol"`.
    keywords: &'static [&'static str],
    /// Prompt block. `{category}` is replaced with the selected category name.
    instruction: &'static str,
    /// Folded generic terms that never count as an instance.
    generic_words: &'static [&'static str],
}

impl EntityRule {
    pub fn applies_to(&self, category: &str) -> bool {
        let folded = fold(category);
        self.keywords.iter().any(|k| folded.contains(k))
    }

    pub fn is_generic(&self, word: &str) -> bool {
        let folded = fold(word.trim());
        self.generic_words.iter().any(|g| *g == folded)
    }

    pub fn instruction_for(&self, category: &str) -> String {
        self.instruction.replace("{category}", category)
    }
}

const STADIUMS: EntityRule = EntityRule {
    name: "stadiums",
    keywords: &["estadio"],
    instruction: "Si eliges la categoría \"{category}\", \"word\" DEBE ser el nombre propio real \
        de un estadio concreto que exista (por ejemplo: Camp Nou, Santiago Bernabéu, Wembley, \
        Maracaná). Cada palabra del nombre empieza por mayúscula. NO uses términos genéricos ni \
        relacionados como estadio, campo, cancha, grada, césped o afición.",
    generic_words: &[
        "estadio", "estadios", "campo", "cancha", "grada", "gradas", "cesped", "arena", "coliseo",
        "pabellon", "polideportivo", "aficion", "porteria", "marcador",
    ],
};

#[derive(Debug, Clone)]
pub struct CategoryRules {
    entity_rules: Vec<EntityRule>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::new(vec![STADIUMS])
    }
}

impl CategoryRules {
    pub fn new(entity_rules: Vec<EntityRule>) -> Self {
        Self { entity_rules }
    }

    /// First entity rule matching `category`, if any.
    pub fn entity_rule_for(&self, category: &str) -> Option<&EntityRule> {
        self.entity_rules.iter().find(|r| r.applies_to(category))
    }

    /// Selected categories that are entity-only, paired with their rule, in selection order.
    pub fn entity_categories<'a>(
        &'a self,
        categories: &'a CategorySet,
    ) -> Vec<(&'a CategoryName, &'a EntityRule)> {
        categories
            .iter()
            .filter_map(|c| self.entity_rule_for(c.as_str()).map(|r| (c, r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stadium_rule_matches_normalized_substrings() {
        let rules = CategoryRules::default();
        assert!(rules.entity_rule_for("Estadios").is_some());
        assert!(rules.entity_rule_for("Estadios de fútbol").is_some());
        assert!(rules.entity_rule_for("ESTÁDIO").is_some());
        assert!(rules.entity_rule_for("Comida").is_none());
    }

    #[test]
    fn test_generic_words_are_folded() {
        let rule = CategoryRules::default();
        let rule = rule.entity_rule_for("Estadios").unwrap();
        assert!(rule.is_generic("Estadio"));
        assert!(rule.is_generic(" Pabellón "));
        assert!(!rule.is_generic("Camp Nou"));
    }

    #[test]
    fn test_generic_words_stay_within_stadium_vocabulary() {
        let rules = CategoryRules::default();
        let rule = rules.entity_rule_for("Estadios").unwrap();
        assert!(rule.is_generic("Cancha"));
        assert!(!rule.is_generic("Cine"));
        assert!(!rule.is_generic("Teatro"));
    }

    #[test]
    fn test_entity_categories_keeps_selection_order() {
        let rules = CategoryRules::default();
        let set = CategorySet::from_raw(&["Comida", "Estadios europeos", "Estadios"]).unwrap();
        let names: Vec<&str> = rules
            .entity_categories(&set)
            .iter()
            .map(|(c, _)| c.as_str())
            .collect();
        assert_eq!(names, vec!["Estadios europeos", "Estadios"]);
    }

    #[test]
    fn test_instruction_names_the_category() {
        let rules = CategoryRules::default();
        let text = rules
            .entity_rule_for("Estadios")
            .unwrap()
            .instruction_for("Estadios");
        assert!(text.contains("\"Estadios\""));
    }
}

//! Curated local word bank used when generation is unavailable or exhausted.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::secret::category::CategorySet;
use crate::secret::models::{Difficulty, Secret, LANGUAGE};
use crate::secret::normalize::ledger_key;

#[derive(Debug, Clone, Copy)]
pub struct FallbackEntry {
    pub word: &'static str,
    pub hints: [&'static str; 3],
}

const fn entry(word: &'static str, hints: [&'static str; 3]) -> FallbackEntry {
    FallbackEntry { word, hints }
}

const WORD_BANK: &[(&str, &[FallbackEntry])] = &[
    (
        "Lugares",
        &[
            entry("playa", ["arena", "mar", "sombrilla"]),
            entry("aeropuerto", ["maletas", "vuelos", "terminal"]),
            entry("biblioteca", ["silencio", "libros", "préstamo"]),
            entry("hospital", ["urgencias", "médicos", "pacientes"]),
            entry("museo", ["arte", "exposiciones", "entradas"]),
        ],
    ),
    (
        "Comida",
        &[
            entry("pizza", ["queso", "horno", "porciones"]),
            entry("sushi", ["arroz", "palillos", "pescado"]),
            entry("paella", ["arroz", "marisco", "sartén"]),
            entry("tacos", ["tortilla", "salsa", "relleno"]),
        ],
    ),
    (
        "Animales",
        &[
            entry("delfín", ["mar", "saltos", "inteligente"]),
            entry("jirafa", ["cuello", "manchas", "sabana"]),
            entry("pingüino", ["hielo", "frío", "caminar"]),
            entry("lobo", ["aullido", "manada", "bosque"]),
        ],
    ),
    (
        "Objetos",
        &[
            entry("teléfono", ["apps", "pantalla", "llamadas"]),
            entry("paraguas", ["lluvia", "abrir", "mojarse"]),
            entry("llave", ["cerradura", "metal", "abrir"]),
            entry("gafas", ["lentes", "vista", "montura"]),
        ],
    ),
    (
        "Ocio",
        &[
            entry("cine", ["palomitas", "pantalla", "butacas"]),
            entry("concierto", ["música", "escenario", "entradas"]),
            entry("fútbol", ["balón", "gol", "equipo"]),
            entry("camping", ["tienda", "bosque", "fuego"]),
        ],
    ),
];

/// Static category → entries table. Lookups use exact category names.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPool {
    bank: &'static [(&'static str, &'static [FallbackEntry])],
}

impl Default for FallbackPool {
    fn default() -> Self {
        Self { bank: WORD_BANK }
    }
}

impl FallbackPool {
    /// Built-in category names.
    pub fn categories(&self) -> impl Iterator<Item = &'static str> {
        self.bank.iter().map(|(name, _)| *name)
    }

    /// True when at least one selected category has local entries.
    pub fn covers(&self, categories: &CategorySet) -> bool {
        categories
            .iter()
            .any(|c| self.bank.iter().any(|(name, _)| *name == c.as_str()))
    }

    /// Uniform pick among entries of the selected categories, preferring
    /// words not in the ledger. Falls back to already-used words rather than
    /// returning nothing. `None` only when no selected category is in the pool.
    pub fn choose<R: Rng + ?Sized>(
        &self,
        categories: &CategorySet,
        used_words: &[String],
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<Secret> {
        let all: Vec<(&'static str, &FallbackEntry)> = categories
            .iter()
            .filter_map(|c| self.bank.iter().find(|(name, _)| *name == c.as_str()))
            .flat_map(|(name, entries)| entries.iter().map(move |e| (*name, e)))
            .collect();

        let used: Vec<String> = used_words.iter().map(|w| ledger_key(w)).collect();
        let unused: Vec<(&'static str, &FallbackEntry)> = all
            .iter()
            .copied()
            .filter(|(_, e)| !used.contains(&ledger_key(e.word)))
            .collect();

        let pool = if unused.is_empty() { &all } else { &unused };
        let (category, chosen) = pool.choose(rng)?;

        Some(Secret {
            language: LANGUAGE.to_string(),
            category: category.to_string(),
            word: chosen.word.to_string(),
            difficulty,
            hints: chosen.hints.iter().map(|h| h.to_string()).collect(),
        })
    }
}

//! Secret-word pipeline for the Impostor game: category sanitizing, prompt
//! construction, output parsing, validation, bounded retries and the local
//! fallback pool.

pub mod category;
pub mod fallback;
pub mod handlers;
pub mod lexical;
pub mod models;
pub mod moderation;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod rules;
pub mod semantic;

#[cfg(test)]
mod testing;

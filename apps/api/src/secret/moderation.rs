//! Safety classification of accepted candidates.
//!
//! A flagged candidate is always rejected as a whole. When the classifier
//! itself fails the orchestrator treats the candidate as flagged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::backend::{http_client, truncate_diagnostic, BackendOutcome, ConfigError, GenerationBackend};
use crate::config::{Config, ModerationMode};
use crate::secret::models::Secret;
use crate::secret::parser::parse_json_object;
use crate::secret::prompts::build_moderation_prompt;

const OPENAI_MODERATION_URL: &str = "https://api.openai.com/v1/moderations";
const MODERATION_TIMEOUT: Duration = Duration::from_secs(20);
const CLASSIFY_MAX_TOKENS: u32 = 32;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Classifier backend failed: {0}")]
    Backend(String),

    #[error("Unreadable classifier response")]
    Unreadable,
}

#[async_trait]
pub trait ContentModerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(true)` when the text must not be shown to players.
    async fn classify(&self, text: &str) -> Result<bool, ModerationError>;
}

/// Text that gets classified: the word followed by its hints.
pub fn moderation_text(secret: &Secret) -> String {
    std::iter::once(secret.word.as_str())
        .chain(secret.hints.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the moderator selected by `config.moderation`.
pub fn build_moderator(
    config: &Config,
    backend: Arc<dyn GenerationBackend>,
) -> Result<Arc<dyn ContentModerator>, ConfigError> {
    Ok(match config.moderation {
        ModerationMode::Backend => Arc::new(BackendModerator::new(backend)),
        ModerationMode::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or(ConfigError::MissingSetting("OPENAI_API_KEY"))?;
            Arc::new(OpenAiModerator::new(api_key)?)
        }
        ModerationMode::Off => Arc::new(DisabledModerator),
    })
}

/// Asks the generation backend for a `{"flagged": bool}` verdict.
pub struct BackendModerator {
    backend: Arc<dyn GenerationBackend>,
}

impl BackendModerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ContentModerator for BackendModerator {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn classify(&self, text: &str) -> Result<bool, ModerationError> {
        let prompt = build_moderation_prompt(text);
        match self.backend.generate(&prompt, CLASSIFY_MAX_TOKENS).await {
            BackendOutcome::Completed(raw) => parse_json_object(&raw)
                .ok()
                .and_then(|map| map.get("flagged").and_then(|v| v.as_bool()))
                .ok_or(ModerationError::Unreadable),
            other => Err(ModerationError::Backend(format!("{other:?}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
}

/// OpenAI moderations endpoint.
pub struct OpenAiModerator {
    client: Client,
    api_key: String,
}

impl OpenAiModerator {
    pub fn new(api_key: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(MODERATION_TIMEOUT)?,
            api_key,
        })
    }
}

#[async_trait]
impl ContentModerator for OpenAiModerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn classify(&self, text: &str) -> Result<bool, ModerationError> {
        let response = self
            .client
            .post(OPENAI_MODERATION_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::Api {
                status: status.as_u16(),
                message: truncate_diagnostic(&body),
            });
        }

        let parsed: ModerationResponse = response.json().await?;
        Ok(parsed.results.iter().any(|r| r.flagged))
    }
}

/// Never flags. Only for deployments that moderate elsewhere.
pub struct DisabledModerator;

#[async_trait]
impl ContentModerator for DisabledModerator {
    fn name(&self) -> &'static str {
        "off"
    }

    async fn classify(&self, _text: &str) -> Result<bool, ModerationError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::models::{Difficulty, LANGUAGE};
    use crate::secret::testing::ScriptedBackend;

    #[test]
    fn test_moderation_text_joins_word_and_hints() {
        let secret = Secret {
            language: LANGUAGE.to_string(),
            category: "Comida".to_string(),
            word: "pizza".to_string(),
            difficulty: Difficulty::Easy,
            hints: vec!["queso".into(), "horno".into(), "porciones".into()],
        };
        assert_eq!(moderation_text(&secret), "pizza queso horno porciones");
    }

    #[tokio::test]
    async fn test_backend_moderator_reads_verdict() {
        let backend = Arc::new(ScriptedBackend::completing(&[
            "{\"flagged\": false}",
            "{\"flagged\": true}",
        ]));
        let moderator = BackendModerator::new(backend.clone());
        assert!(!moderator.classify("pizza queso").await.unwrap());
        assert!(moderator.classify("algo feo").await.unwrap());
        assert!(backend.prompts()[0].contains("pizza queso"));
    }

    #[tokio::test]
    async fn test_backend_moderator_errors_on_garbage_or_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            BackendOutcome::Completed("no sé".to_string()),
            BackendOutcome::TimedOut { polls: 30 },
        ]));
        let moderator = BackendModerator::new(backend);
        assert!(matches!(
            moderator.classify("x").await,
            Err(ModerationError::Unreadable)
        ));
        assert!(matches!(
            moderator.classify("x").await,
            Err(ModerationError::Backend(_))
        ));
    }

    #[test]
    fn test_openai_mode_requires_key() {
        let mut config = Config::for_tests();
        config.moderation = ModerationMode::OpenAi;
        let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::completing(&[]));
        let err = build_moderator(&config, backend.clone()).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSetting("OPENAI_API_KEY")));

        config.openai_api_key = Some("sk-test".to_string());
        assert_eq!(build_moderator(&config, backend).unwrap().name(), "openai");
    }
}

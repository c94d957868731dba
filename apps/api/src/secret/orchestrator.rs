//! Secret generation: drives the bounded attempt loop.
//!
//! Flow per attempt: build prompt → backend → parse → lexical checks →
//! semantic check (entity-only categories) → moderation → accept or retry.
//! The codes of a rejected attempt become the corrective feedback of the
//! next prompt. When the budget runs out the local pool takes over.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{build_backend, BackendOutcome, ConfigError, GenerationBackend};
use crate::config::Config;
use crate::errors::AppError;
use crate::secret::fallback::FallbackPool;
use crate::secret::lexical::validate_candidate;
use crate::secret::models::{
    join_codes, AttemptError, GenerationAttempt, Secret, SecretRequest, LANGUAGE,
};
use crate::secret::moderation::{build_moderator, moderation_text, ContentModerator};
use crate::secret::parser::parse_candidate;
use crate::secret::prompts::{build_secret_prompt, PromptInput};
use crate::secret::rules::CategoryRules;
use crate::secret::semantic::verify_entity;

/// Tokens requested for a secret record; the JSON is small.
const SECRET_MAX_TOKENS: u32 = 300;

/// Returned with fallback secrets instead of an error.
pub const FALLBACK_WARNING: &str =
    "No se pudo generar con IA; se usó una palabra del banco local.";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_attempts: u32,
    pub semantic_check: bool,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            semantic_check: config.semantic_check,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct SecretOutcome {
    pub secret: Secret,
    pub source: SecretSource,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    pub warning: Option<String>,
}

/// Everything one request needs. Holds no per-request state, so a single
/// instance serves concurrent requests.
pub struct SecretGenerator {
    backend: Arc<dyn GenerationBackend>,
    moderator: Arc<dyn ContentModerator>,
    rules: CategoryRules,
    fallback: FallbackPool,
    settings: PipelineSettings,
}

impl SecretGenerator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        moderator: Arc<dyn ContentModerator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            backend,
            moderator,
            rules: CategoryRules::default(),
            fallback: FallbackPool::default(),
            settings,
        }
    }

    /// Builds backend and moderator from configuration. Fails on missing
    /// credentials so they are reported before any attempt is spent.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let backend = build_backend(config)?;
        let moderator = build_moderator(config, backend.clone())?;
        info!(
            "Secret generator ready (backend: {}, moderation: {}, attempts: {})",
            backend.name(),
            moderator.name(),
            config.max_attempts
        );
        Ok(Self::new(backend, moderator, PipelineSettings::from(config)))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Runs the attempt loop. Returns the first valid, unflagged secret, a
    /// fallback secret on exhaustion, or the last attempt's codes when no
    /// selected category has local entries.
    pub async fn request_secret(&self, request: &SecretRequest) -> Result<SecretOutcome, AppError> {
        let mut feedback: Vec<AttemptError> = Vec::new();

        for attempt_index in 1..=self.settings.max_attempts {
            let (attempt, accepted) = self.run_attempt(attempt_index, request, &feedback).await;

            if let Some(secret) = accepted {
                info!(
                    "Attempt {}/{} accepted '{}' in '{}'",
                    attempt_index, self.settings.max_attempts, secret.word, secret.category
                );
                return Ok(SecretOutcome {
                    secret,
                    source: SecretSource::Generated,
                    attempts: attempt_index,
                    warning: None,
                });
            }

            let kind = if attempt.errors.iter().any(AttemptError::is_backend_failure) {
                "backend failure"
            } else {
                "candidate rejected"
            };
            let word = attempt
                .candidate
                .as_ref()
                .map(|c| c.word.as_str())
                .unwrap_or("-");
            warn!(
                "Attempt {}/{} {} (word: '{}'): [{}]",
                attempt.attempt_index,
                self.settings.max_attempts,
                kind,
                word,
                join_codes(&attempt.errors)
            );
            feedback = attempt.errors;
        }

        self.fall_back(request, feedback)
    }

    fn fall_back(
        &self,
        request: &SecretRequest,
        last_errors: Vec<AttemptError>,
    ) -> Result<SecretOutcome, AppError> {
        let attempts = self.settings.max_attempts;
        let chosen = if self.fallback.covers(&request.categories) {
            let mut rng = rand::thread_rng();
            self.fallback.choose(
                &request.categories,
                &request.used_words,
                request.difficulty,
                &mut rng,
            )
        } else {
            None
        };

        match chosen {
            Some(secret) => {
                info!(
                    "Generation exhausted after {attempts} attempts; using local word '{}' in '{}'",
                    secret.word, secret.category
                );
                Ok(SecretOutcome {
                    secret,
                    source: SecretSource::Fallback,
                    attempts,
                    warning: Some(FALLBACK_WARNING.to_string()),
                })
            }
            None => {
                warn!(
                    "Generation exhausted after {attempts} attempts with no local fallback: [{}]",
                    join_codes(&last_errors)
                );
                Err(AppError::GenerationExhausted {
                    attempts,
                    codes: last_errors,
                })
            }
        }
    }

    /// One full pass. Returns the attempt record and, when every stage
    /// passed, the accepted secret.
    async fn run_attempt(
        &self,
        attempt_index: u32,
        request: &SecretRequest,
        feedback: &[AttemptError],
    ) -> (GenerationAttempt, Option<Secret>) {
        let prompt = build_secret_prompt(&PromptInput {
            categories: &request.categories,
            difficulty: request.difficulty,
            used_words: &request.used_words,
            feedback,
            rules: &self.rules,
        });
        let mut attempt = GenerationAttempt {
            attempt_index,
            prompt,
            raw_output: String::new(),
            candidate: None,
            errors: Vec::new(),
        };

        debug!(
            "Attempt {attempt_index}: prompt of {} chars",
            attempt.prompt.chars().count()
        );

        let backend_failure = match self.backend.generate(&attempt.prompt, SECRET_MAX_TOKENS).await {
            BackendOutcome::Completed(raw) => {
                attempt.raw_output = raw;
                None
            }
            BackendOutcome::Failed {
                status: Some(status),
                ..
            } => Some(AttemptError::BackendError(status)),
            BackendOutcome::Failed { status: None, .. } => Some(AttemptError::BackendErrorReported),
            BackendOutcome::Unreachable(_) => Some(AttemptError::BackendUnreachable),
            BackendOutcome::TimedOut { .. } => Some(AttemptError::BackendTimeout),
        };
        if let Some(code) = backend_failure {
            attempt.errors.push(code);
            return (attempt, None);
        }
        debug!(
            "Attempt {attempt_index}: raw output {:?}",
            attempt.raw_output.chars().take(200).collect::<String>()
        );

        let candidate = match parse_candidate(&attempt.raw_output) {
            Ok(candidate) => candidate,
            Err(code) => {
                attempt.errors.push(code);
                return (attempt, None);
            }
        };

        attempt.errors = validate_candidate(
            &candidate,
            &request.categories,
            &request.used_words,
            &self.rules,
        );
        let accepted = match request.categories.find(&candidate.category) {
            Some(category) if attempt.errors.is_empty() => Some(Secret {
                language: LANGUAGE.to_string(),
                category: category.as_str().to_string(),
                word: candidate.word.trim().to_string(),
                difficulty: request.difficulty,
                hints: candidate.hints.iter().map(|h| h.trim().to_string()).collect(),
            }),
            _ => None,
        };
        attempt.candidate = Some(candidate);
        let Some(secret) = accepted else {
            return (attempt, None);
        };

        if self.settings.semantic_check {
            if let Some(rule) = self.rules.entity_rule_for(&secret.category) {
                if !verify_entity(self.backend.as_ref(), &secret.category, &secret.word).await {
                    debug!("Semantic check ({}) rejected '{}'", rule.name, secret.word);
                    attempt.errors.push(AttemptError::SemanticCheckFailed);
                    return (attempt, None);
                }
            }
        }

        let flagged = match self.moderator.classify(&moderation_text(&secret)).await {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!("Moderation ({}) unavailable, rejecting candidate: {e}", self.moderator.name());
                true
            }
        };
        if flagged {
            attempt.errors.push(AttemptError::ModerationFlagged);
            return (attempt, None);
        }

        (attempt, Some(secret))
    }
}

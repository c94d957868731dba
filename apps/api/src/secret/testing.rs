//! In-memory doubles for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{BackendOutcome, GenerationBackend};
use crate::secret::moderation::{ContentModerator, ModerationError};

/// Replays scripted outcomes in order and records every prompt it receives.
/// Once the script runs out it keeps returning `repeat`.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<BackendOutcome>>,
    repeat: BackendOutcome,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(outcomes: Vec<BackendOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            repeat: BackendOutcome::Failed {
                status: Some(500),
                reason: "script exhausted".to_string(),
            },
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn completing(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| BackendOutcome::Completed(t.to_string()))
                .collect(),
        )
    }

    pub fn always(outcome: BackendOutcome) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.repeat = outcome;
        backend
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _max_tokens: u32) -> BackendOutcome {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.repeat.clone())
    }
}

/// Flags exactly the texts containing `needle`; `None` flags nothing.
pub struct NeedleModerator {
    pub needle: Option<&'static str>,
}

#[async_trait]
impl ContentModerator for NeedleModerator {
    fn name(&self) -> &'static str {
        "needle"
    }

    async fn classify(&self, text: &str) -> Result<bool, ModerationError> {
        Ok(self.needle.is_some_and(|n| text.contains(n)))
    }
}

/// Classifier that is always down.
pub struct BrokenModerator;

#[async_trait]
impl ContentModerator for BrokenModerator {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn classify(&self, _text: &str) -> Result<bool, ModerationError> {
        Err(ModerationError::Backend("unavailable".to_string()))
    }
}

//! Generation backends. The only modules that talk to a text generator.
//!
//! Both shapes (single request/response and start-then-poll jobs) sit behind
//! [`GenerationBackend`] and report through the tagged [`BackendOutcome`].
//! Adapters never return `Err` and never panic past this boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{BackendKind, Config};

pub mod anthropic;
pub mod prompts;
pub mod space;

use anthropic::AnthropicBackend;
use space::SpaceBackend;

/// Diagnostic text from a backend is cut to this many characters before it is logged or kept.
const DIAGNOSTIC_CHARS: usize = 400;

/// Normalized result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// Raw generator text. May still be garbage; the parser decides.
    Completed(String),
    /// Explicit failure. `status` is the HTTP status when there was one.
    Failed { status: Option<u16>, reason: String },
    /// No response at all (connect error, request timeout).
    Unreachable(String),
    /// A job never reached a terminal state within the poll budget.
    TimedOut { polls: u32 },
}

/// A text generator. Implementations must not block beyond their own bounded timeouts.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str, max_tokens: u32) -> BackendOutcome;
}

/// Raised at startup when the configured backend cannot be built.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Missing required setting '{0}' for the configured backend")]
    MissingSetting(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Builds the backend selected by `config.backend`.
pub fn build_backend(config: &Config) -> Result<Arc<dyn GenerationBackend>, ConfigError> {
    match config.backend {
        BackendKind::Anthropic => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or(ConfigError::MissingSetting("ANTHROPIC_API_KEY"))?;
            let backend = AnthropicBackend::new(api_key)?;
            let backend = match &config.anthropic_api_url {
                Some(url) => backend.with_api_url(url.clone()),
                None => backend,
            };
            Ok(Arc::new(backend))
        }
        BackendKind::Space => {
            let base_url = config
                .space_url
                .clone()
                .ok_or(ConfigError::MissingSetting("HF_SPACE_URL"))?;
            Ok(Arc::new(SpaceBackend::new(
                base_url,
                config.space_api_name.clone(),
                Duration::from_millis(config.space_poll_interval_ms),
                config.space_max_polls,
            )?))
        }
    }
}

/// Shared reqwest client constructor for all adapters.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// First [`DIAGNOSTIC_CHARS`] characters of `text`.
pub(crate) fn truncate_diagnostic(text: &str) -> String {
    text.chars().take(DIAGNOSTIC_CHARS).collect()
}

/// Serves `router` on an ephemeral local port and returns its base URL.
#[cfg(test)]
pub(crate) async fn spawn_mock_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_anthropic_key_is_config_error() {
        let mut config = Config::for_tests();
        config.anthropic_api_key = None;
        let err = build_backend(&config).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSetting("ANTHROPIC_API_KEY")));
    }

    #[test]
    fn test_missing_space_url_is_config_error() {
        let mut config = Config::for_tests();
        config.backend = BackendKind::Space;
        let err = build_backend(&config).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSetting("HF_SPACE_URL")));
    }

    #[test]
    fn test_builds_configured_backend() {
        let mut config = Config::for_tests();
        assert_eq!(build_backend(&config).unwrap().name(), "anthropic");

        config.backend = BackendKind::Space;
        config.space_url = Some("http://localhost:7860".to_string());
        assert_eq!(build_backend(&config).unwrap().name(), "space");
    }

    #[test]
    fn test_truncate_diagnostic_counts_chars() {
        let long = "ñ".repeat(500);
        assert_eq!(truncate_diagnostic(&long).chars().count(), 400);
        assert_eq!(truncate_diagnostic("corto"), "corto");
    }
}

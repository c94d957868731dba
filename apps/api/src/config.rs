use std::str::FromStr;

use anyhow::{Context, Result};

/// Which generation backend serves `/api/word`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Single request/response call to the Anthropic Messages API.
    Anthropic,
    /// Gradio Space job: start call, then poll for the result.
    Space,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Anthropic => "anthropic",
            BackendKind::Space => "space",
        }
    }

    /// Attempt budget when `GENERATION_MAX_ATTEMPTS` is not set.
    /// Job backends already spend up to a full poll budget per attempt.
    pub fn default_max_attempts(self) -> u32 {
        match self {
            BackendKind::Anthropic => 4,
            BackendKind::Space => 1,
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(BackendKind::Anthropic),
            "space" | "gradio" => Ok(BackendKind::Space),
            other => Err(format!("unknown generation backend '{other}'")),
        }
    }
}

/// How final candidates are safety-classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationMode {
    /// Classification prompt sent through the generation backend.
    Backend,
    /// OpenAI moderations endpoint.
    OpenAi,
    Off,
}

impl FromStr for ModerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(ModerationMode::Backend),
            "openai" => Ok(ModerationMode::OpenAi),
            "off" | "none" => Ok(ModerationMode::Off),
            other => Err(format!("unknown moderation mode '{other}'")),
        }
    }
}

const MAX_ATTEMPTS_CEILING: u32 = 8;

/// Application configuration loaded from environment variables.
///
/// Backend credentials are optional here: a missing key does not stop the
/// service, it makes `/api/word` answer with a configuration error.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub backend: BackendKind,
    pub anthropic_api_key: Option<String>,
    /// Overrides the Messages endpoint (proxies, local mocks).
    pub anthropic_api_url: Option<String>,
    pub space_url: Option<String>,
    pub space_api_name: String,
    pub space_poll_interval_ms: u64,
    pub space_max_polls: u32,
    pub max_attempts: u32,
    pub semantic_check: bool,
    pub moderation: ModerationMode,
    pub openai_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let backend: BackendKind = parse_env("GENERATION_BACKEND", BackendKind::Anthropic)?;
        let max_attempts =
            resolve_max_attempts(optional_env("GENERATION_MAX_ATTEMPTS").as_deref(), backend)?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            backend,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_api_url: optional_env("ANTHROPIC_API_URL"),
            space_url: space_url(optional_env("HF_SPACE_URL")),
            space_api_name: optional_env("SPACE_API_NAME").unwrap_or_else(|| "predict".to_string()),
            space_poll_interval_ms: parse_env("SPACE_POLL_INTERVAL_MS", 500)?,
            space_max_polls: parse_env("SPACE_MAX_POLLS", 30)?,
            max_attempts,
            semantic_check: parse_env("SEMANTIC_CHECK", true)?,
            moderation: parse_env("MODERATION", ModerationMode::Backend)?,
            openai_api_key: optional_env("OPENAI_API_KEY"),
        })
    }

    /// Anthropic backend with a fake key, no moderation. Never touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            backend: BackendKind::Anthropic,
            anthropic_api_key: Some("test-key".to_string()),
            anthropic_api_url: None,
            space_url: None,
            space_api_name: "predict".to_string(),
            space_poll_interval_ms: 500,
            space_max_polls: 30,
            max_attempts: 4,
            semantic_check: true,
            moderation: ModerationMode::Off,
            openai_api_key: None,
        }
    }
}

/// Non-empty value of `key`, or `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, optional_env(key).as_deref(), default)
}

fn parse_value<T>(key: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// The deploy template's `YOUR_SPACE_URL` placeholder counts as unset.
fn space_url(raw: Option<String>) -> Option<String> {
    raw.filter(|url| url != "YOUR_SPACE_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
}

/// Explicit budget clamped to `1..=MAX_ATTEMPTS_CEILING`, else the backend default.
fn resolve_max_attempts(raw: Option<&str>, backend: BackendKind) -> Result<u32> {
    let attempts = match raw {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("GENERATION_MAX_ATTEMPTS must be a non-negative integer, got '{raw}'"))?,
        None => backend.default_max_attempts(),
    };
    Ok(attempts.clamp(1, MAX_ATTEMPTS_CEILING))
}

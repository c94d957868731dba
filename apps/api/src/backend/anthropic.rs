//! Synchronous backend: one Anthropic Messages API call per generation.
//!
//! Model is hardcoded so prompt tuning stays tied to a single model.
//! No internal retries: the orchestrator owns the attempt budget.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::prompts::JSON_ONLY_SYSTEM;
use crate::backend::{http_client, truncate_diagnostic, BackendOutcome, ConfigError, GenerationBackend};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Text of the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(REQUEST_TIMEOUT)?,
            api_key,
            api_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Points the client at another Messages-compatible endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> BackendOutcome {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            system: JSON_ONLY_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = match self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Anthropic request failed before a response: {e}");
                return BackendOutcome::Unreachable(e.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return BackendOutcome::Unreachable(e.to_string()),
        };

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Anthropic API returned {}: {}", status, truncate_diagnostic(&message));
            return BackendOutcome::Failed {
                status: Some(status.as_u16()),
                reason: truncate_diagnostic(&message),
            };
        }

        // A success body that is not a Messages response is handed to the parser as-is.
        match serde_json::from_str::<MessagesResponse>(&body) {
            Ok(parsed) => {
                if let Some(usage) = &parsed.usage {
                    debug!(
                        "Anthropic call succeeded: input_tokens={}, output_tokens={}",
                        usage.input_tokens, usage.output_tokens
                    );
                }
                BackendOutcome::Completed(parsed.text().unwrap_or_default().to_string())
            }
            Err(_) => BackendOutcome::Completed(body),
        }
    }
}

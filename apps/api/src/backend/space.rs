//! Job-based backend: a Gradio Space behind its `/call/<api>` HTTP protocol.
//!
//! `POST {base}/call/{api}` with `{"data": [prompt, max_tokens]}` returns an
//! `event_id`; the result is then polled from `GET {base}/call/{api}/{event_id}`
//! at a fixed interval for a fixed number of polls, all within a deadline of
//! `poll_interval * max_polls`. Missing the deadline or running out of polls
//! is a timeout, distinct from a failure the Space reports itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::{http_client, truncate_diagnostic, BackendOutcome, ConfigError, GenerationBackend};

/// Per-HTTP-request timeout. Polling is additionally bounded by the job deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SpaceBackend {
    client: Client,
    base_url: String,
    api_name: String,
    poll_interval: Duration,
    max_polls: u32,
}

/// What one poll response says about the job.
#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Pending,
    Complete(String),
    Failed(String),
}

impl SpaceBackend {
    pub fn new(
        base_url: String,
        api_name: String,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_name,
            poll_interval,
            max_polls,
        })
    }

    fn call_url(&self) -> String {
        format!("{}/call/{}", self.base_url, self.api_name)
    }

    /// Starts the job and returns its event id, or the outcome to report instead.
    async fn start_job(&self, prompt: &str, max_tokens: u32) -> Result<String, BackendOutcome> {
        let response = self
            .client
            .post(self.call_url())
            .json(&json!({ "data": [prompt, max_tokens] }))
            .send()
            .await
            .map_err(|e| {
                warn!("Space start request failed: {e}");
                BackendOutcome::Unreachable(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("Space start failed with {}: {}", status, truncate_diagnostic(&body));
            return Err(BackendOutcome::Failed {
                status: Some(status.as_u16()),
                reason: truncate_diagnostic(&body),
            });
        }

        event_id_from(&body).ok_or_else(|| BackendOutcome::Failed {
            status: None,
            reason: format!("Space did not return event_id: {}", truncate_diagnostic(&body)),
        })
    }

    /// Polls until a terminal state, the poll budget, or the job deadline,
    /// whichever comes first.
    async fn poll_job(&self, event_id: &str) -> BackendOutcome {
        let deadline = self.poll_interval * self.max_polls;
        match tokio::time::timeout(deadline, self.poll_until_terminal(event_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Space job {event_id} missed its {}ms deadline",
                    deadline.as_millis()
                );
                BackendOutcome::TimedOut {
                    polls: self.max_polls,
                }
            }
        }
    }

    async fn poll_until_terminal(&self, event_id: &str) -> BackendOutcome {
        let url = format!("{}/{}", self.call_url(), event_id);
        let mut last_raw = String::new();

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!("Space poll {poll}/{} failed: {e}", self.max_polls);
                    continue;
                }
            };
            let status = response.status();
            last_raw = response.text().await.unwrap_or_default();

            if !status.is_success() {
                debug!("Space poll {poll}/{} returned {status}", self.max_polls);
                continue;
            }

            match parse_poll_body(&last_raw) {
                PollState::Pending => debug!("Space job {event_id} pending ({poll}/{})", self.max_polls),
                PollState::Complete(output) => return BackendOutcome::Completed(output),
                PollState::Failed(reason) => {
                    warn!("Space job {event_id} failed: {}", truncate_diagnostic(&reason));
                    return BackendOutcome::Failed {
                        status: None,
                        reason: truncate_diagnostic(&reason),
                    };
                }
            }
        }

        warn!(
            "Space job {event_id} timed out after {} polls: {}",
            self.max_polls,
            truncate_diagnostic(&last_raw)
        );
        BackendOutcome::TimedOut {
            polls: self.max_polls,
        }
    }
}

#[async_trait]
impl GenerationBackend for SpaceBackend {
    fn name(&self) -> &'static str {
        "space"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> BackendOutcome {
        match self.start_job(prompt, max_tokens).await {
            Ok(event_id) => self.poll_job(&event_id).await,
            Err(outcome) => outcome,
        }
    }
}

fn event_id_from(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("event_id")
        .or_else(|| value.get("eventId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Understands both the server-sent-events stream (`event: complete` /
/// `data: [...]`) and a plain JSON status document (`{"status", "data"}`).
fn parse_poll_body(body: &str) -> PollState {
    if body.lines().any(|l| l.starts_with("event:")) {
        let mut event = "";
        for line in body.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event = name.trim();
            } else if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                match event {
                    "complete" => {
                        return match serde_json::from_str::<Value>(data) {
                            Ok(value) => output_from_data(&value)
                                .map(PollState::Complete)
                                .unwrap_or(PollState::Pending),
                            Err(_) => PollState::Complete(data.to_string()),
                        }
                    }
                    "error" => return PollState::Failed(data.to_string()),
                    _ => {}
                }
            }
        }
        return PollState::Pending;
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return PollState::Pending;
    };
    match value.get("status").and_then(Value::as_str) {
        Some("complete") | Some("succeeded") | None => {}
        Some("error") | Some("failed") => {
            let reason = value
                .get("error")
                .or_else(|| value.get("message"))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "job failed".to_string());
            return PollState::Failed(reason);
        }
        Some(_) => return PollState::Pending,
    }
    value
        .get("data")
        .and_then(output_from_data)
        .map(PollState::Complete)
        .unwrap_or(PollState::Pending)
}

/// First element of `data` (or `data` itself when it is not an array), as text.
fn output_from_data(data: &Value) -> Option<String> {
    let output = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match output {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

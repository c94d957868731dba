use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::secret::models::{join_codes, AttemptError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend credential or endpoint missing. Reported before any attempt.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation exhausted after {attempts} attempts: [{}]", join_codes(.codes))]
    GenerationExhausted {
        attempts: u32,
        codes: Vec<AttemptError>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::GenerationExhausted { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details): (&str, String, Option<Value>) = match &self {
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                ("CONFIG_ERROR", msg.clone(), None)
            }
            AppError::GenerationExhausted { attempts, codes } => (
                "GENERATION_EXHAUSTED",
                format!("No valid secret after {attempts} attempts"),
                Some(json!(codes)),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

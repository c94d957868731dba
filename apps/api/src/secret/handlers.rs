use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::secret::category::CategorySet;
use crate::secret::models::{Difficulty, Secret, SecretRequest};
use crate::secret::orchestrator::{SecretOutcome, SecretSource};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WordRequest {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(
        default,
        rename = "usedWords",
        alias = "used_words",
        deserialize_with = "lenient_strings"
    )]
    pub used_words: Vec<String>,
}

/// Strings, numbers and booleans become text; other entries are dropped.
/// Anything but an array reads as empty.
fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct WordResponse {
    #[serde(flatten)]
    pub secret: Secret,
    pub source: SecretSource,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<SecretOutcome> for WordResponse {
    fn from(outcome: SecretOutcome) -> Self {
        Self {
            secret: outcome.secret,
            source: outcome.source,
            attempts: outcome.attempts,
            warning: outcome.warning,
        }
    }
}

/// POST /api/word
pub async fn handle_request_word(
    State(state): State<AppState>,
    payload: Result<Json<WordRequest>, JsonRejection>,
) -> Result<Json<WordResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let categories = CategorySet::from_raw(req.categories.as_slice())
        .ok_or_else(|| AppError::Validation("No categories selected".to_string()))?;
    let generator = state.generator()?;

    let request = SecretRequest {
        categories,
        difficulty: req.difficulty,
        used_words: req.used_words,
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("request_word", %request_id, backend = generator.backend_name());
    info!(
        parent: &span,
        "Secret requested: {} categories, difficulty {}, {} used words",
        request.categories.len(),
        request.difficulty.as_str(),
        request.used_words.len()
    );

    // Runs detached so a dropped connection cannot cut an attempt short.
    let outcome = tokio::spawn(
        async move { generator.request_secret(&request).await }.instrument(span),
    )
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("secret generation task failed: {e}")))??;

    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::backend::{BackendOutcome, ConfigError};
    use crate::config::Config;
    use crate::routes::build_router;
    use crate::secret::orchestrator::{PipelineSettings, SecretGenerator, FALLBACK_WARNING};
    use crate::secret::testing::{NeedleModerator, ScriptedBackend};

    const LOBO: &str = r#"{"category":"Animales","word":"lobo","hints":["aullido","manada","bosque"]}"#;

    fn app_with(backend: Arc<ScriptedBackend>, max_attempts: u32) -> Router {
        let generator = SecretGenerator::new(
            backend,
            Arc::new(NeedleModerator { needle: None }),
            PipelineSettings {
                max_attempts,
                semantic_check: true,
            },
        );
        build_router(AppState {
            config: Config::for_tests(),
            generator: Ok(Arc::new(generator)),
        })
    }

    async fn post_word(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/word")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generated_secret_is_flattened() {
        let backend = Arc::new(ScriptedBackend::completing(&[LOBO]));
        let (status, body) = post_word(
            app_with(backend.clone(), 4),
            json!({"categories": ["Animales", "Comida"], "difficulty": "normal"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "es");
        assert_eq!(body["category"], "Animales");
        assert_eq!(body["word"], "lobo");
        assert_eq!(body["difficulty"], "normal");
        assert_eq!(body["hints"].as_array().unwrap().len(), 3);
        assert_eq!(body["source"], "generated");
        assert_eq!(body["attempts"], 1);
        assert!(body.get("warning").is_none());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_valid_categories_spends_no_attempts() {
        let backend = Arc::new(ScriptedBackend::completing(&[LOBO]));
        let (status, body) = post_word(
            app_with(backend.clone(), 4),
            json!({"categories": ["", "  ", "!!!"]}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let app = app_with(Arc::new(ScriptedBackend::completing(&[])), 1);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/word")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_accepts_both_spellings() {
        let req: WordRequest =
            serde_json::from_value(json!({"categories": ["Comida"], "used_words": ["pizza"]}))
                .unwrap();
        assert_eq!(req.used_words, vec!["pizza"]);
        assert_eq!(req.difficulty, Difficulty::Easy);

        let req: WordRequest =
            serde_json::from_value(json!({"categories": ["Comida"], "usedWords": ["sushi"]}))
                .unwrap();
        assert_eq!(req.used_words, vec!["sushi"]);
    }

    #[test]
    fn test_odd_entries_are_coerced_or_dropped() {
        let req: WordRequest = serde_json::from_value(json!({
            "categories": ["Comida", 2024, null, {"x": 1}, true],
            "usedWords": "pizza"
        }))
        .unwrap();
        assert_eq!(req.categories, vec!["Comida", "2024", "true"]);
        assert!(req.used_words.is_empty());

        let req: WordRequest =
            serde_json::from_value(json!({"categories": "Comida", "usedWords": ["lobo", 7]}))
                .unwrap();
        assert!(req.categories.is_empty());
        assert_eq!(req.used_words, vec!["lobo", "7"]);
    }

    #[tokio::test]
    async fn test_bad_entries_do_not_reject_the_request() {
        let backend = Arc::new(ScriptedBackend::completing(&[LOBO]));
        let (status, body) = post_word(
            app_with(backend.clone(), 4),
            json!({"categories": [42, "Animales", null], "usedWords": {"not": "a list"}}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["word"], "lobo");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_falls_back_with_warning() {
        let backend = Arc::new(ScriptedBackend::always(BackendOutcome::Unreachable(
            "connection refused".to_string(),
        )));
        let (status, body) = post_word(
            app_with(backend.clone(), 2),
            json!({"categories": ["Comida"], "usedWords": ["pizza", "sushi", "paella"]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["word"], "tacos");
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["attempts"], 2);
        assert_eq!(body["warning"], FALLBACK_WARNING);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_without_fallback_is_bad_gateway() {
        let backend = Arc::new(ScriptedBackend::completing(&["no hay json aquí"]));
        let (status, body) = post_word(
            app_with(backend, 1),
            json!({"categories": ["Series de televisión"]}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "GENERATION_EXHAUSTED");
        assert_eq!(body["error"]["details"], json!(["json_parse_failed"]));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let app = build_router(AppState {
            config: Config::for_tests(),
            generator: Err(ConfigError::MissingSetting("ANTHROPIC_API_KEY")),
        });
        let (status, body) = post_word(app, json!({"categories": ["Comida"]})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONFIG_ERROR");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("ANTHROPIC_API_KEY"));
    }
}

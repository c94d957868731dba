use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::secret::fallback::FallbackPool;
use crate::state::AppState;

/// GET /health
/// Always 200 while the process is up. `ready` is false when the configured
/// backend is missing a credential or endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let fallback_categories: Vec<&str> = FallbackPool::default().categories().collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "impostor-api",
        "backend": state.config.backend.as_str(),
        "ready": state.is_ready(),
        "fallback_categories": fallback_categories
    }))
}

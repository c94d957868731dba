pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::secret::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/word", post(handlers::handle_request_word))
        .with_state(state)
}

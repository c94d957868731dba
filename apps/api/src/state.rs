use std::sync::Arc;

use crate::backend::ConfigError;
use crate::config::Config;
use crate::errors::AppError;
use crate::secret::orchestrator::SecretGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `Err` when the configured backend is missing a credential or endpoint.
    /// The service still starts; `/api/word` answers with the error.
    pub generator: Result<Arc<SecretGenerator>, ConfigError>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let generator = SecretGenerator::from_config(&config).map(Arc::new);
        if let Err(e) = &generator {
            tracing::warn!("Secret generation unavailable: {e}");
        }
        Self { config, generator }
    }

    pub fn generator(&self) -> Result<Arc<SecretGenerator>, AppError> {
        self.generator
            .clone()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.generator.is_ok()
    }
}

pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod logging;
pub mod preprocess;
pub mod routes;
pub mod store;
pub mod test_util;

pub use artifact::{ArtifactRegistry, FsArtifactSource};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::GatewayError;
pub use llm::{GeminiClient, ReviewAnalyzer};
pub use store::{PredictionStore, SqliteStore};

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::store::StoreError;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Process-wide artifact cache, also read by `GET /models`.
    pub registry: Arc<ArtifactRegistry>,
    pub dispatcher: Dispatcher,
    /// Prediction log, also read by `GET /records`.
    pub store: Arc<dyn PredictionStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<ArtifactRegistry>,
        analyzer: Arc<ReviewAnalyzer>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), analyzer, store.clone());
        Self {
            config,
            registry,
            dispatcher,
            store,
        }
    }

    /// Wire the production components described by `config`.
    ///
    /// Only the database is touched here; artifacts load lazily unless
    /// `artifacts.eager_load` is set and `ArtifactRegistry::preload` is called.
    pub fn from_config(config: Config) -> Result<Self, StoreError> {
        let source = Arc::new(FsArtifactSource::new(config.artifacts.clone()));
        let registry = Arc::new(ArtifactRegistry::new(source));

        let api_key = config.llm.resolved_api_key().unwrap_or_else(|| {
            tracing::warn!("No LLM API key configured; review analysis requests will fail");
            String::new()
        });
        let generator = Arc::new(GeminiClient::with_timeout(
            &config.llm.base_url,
            &config.llm.model,
            &api_key,
            config.llm.max_output_tokens,
            Some(config.llm.timeout()),
        ));
        let analyzer = Arc::new(ReviewAnalyzer::from_config(generator, &config.llm));

        let store: Arc<dyn PredictionStore> = Arc::new(SqliteStore::new(&config.database.url)?);

        Ok(Self::new(config, registry, analyzer, store))
    }
}

/// Build the HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::predict::router(state.clone()))
        .merge(routes::models::router(state.clone()))
        .merge(routes::records::router(state))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

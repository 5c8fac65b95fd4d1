use std::net::SocketAddr;
use std::sync::Arc;

use modelhub_common::ModelFamily;
use modelhub_gateway::{app, logging, AppState, Config};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    logging::init_tracing(&config.logging.level);

    tracing::info!("Starting ModelHub Gateway");

    for family in ModelFamily::ALL {
        for path in config.artifacts.files_for(family) {
            if !path.exists() {
                tracing::warn!(
                    family = %family,
                    path = %path.display(),
                    "Artifact file not found; requests for this family will fail"
                );
            }
        }
    }

    let state = Arc::new(AppState::from_config(config.clone())?);

    if config.artifacts.eager_load {
        tracing::info!("Preloading model artifacts");
        state.registry.preload().await;
    }

    let router = app(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

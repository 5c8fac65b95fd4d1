//! Per-family artifact status.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use modelhub_common::{FamilyInfo, ModelFamily};

use crate::AppState;

/// Response from the /models endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<FamilyInfo>,
}

/// GET /models - Load state of every model family
async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let data = ModelFamily::ALL
        .into_iter()
        .map(|family| FamilyInfo {
            family,
            status: state.registry.status(family),
        })
        .collect();

    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/models", get(list_models))
        .with_state(state)
}

//! Read-only view of persisted predictions.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use modelhub_common::ModelFamily;

use crate::error::GatewayError;
use crate::AppState;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub family: ModelFamily,
    pub records: Vec<Value>,
}

/// GET /records/:family - Newest persisted records of one family
async fn recent_records(
    State(state): State<Arc<AppState>>,
    Path(family): Path<String>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, GatewayError> {
    let family = ModelFamily::from_name(&family)
        .ok_or_else(|| GatewayError::NotFound(format!("unknown model family '{}'", family)))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let store = state.store.clone();
    let records = tokio::task::spawn_blocking(move || store.recent(family, limit))
        .await
        .map_err(|e| GatewayError::PersistenceFailed(e.to_string()))??;

    Ok(Json(RecordsResponse { family, records }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/records/:family", get(recent_records))
        .with_state(state)
}

//! Prediction endpoints, one per model family.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::de::DeserializeOwned;

use modelhub_common::{
    AdvertisingRequest, CommentRequest, DecodedResult, InferenceRequest, IrisRequest,
    ReviewRequest, Validate,
};

use super::{ClientIp, ValidatedJson};
use crate::error::GatewayError;
use crate::AppState;

/// POST handler shared by every family; the body type selects the family.
async fn predict<T>(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(body): ValidatedJson<T>,
) -> Result<Json<DecodedResult>, GatewayError>
where
    T: DeserializeOwned + Validate + Into<InferenceRequest> + Send + 'static,
{
    let result = state.dispatcher.dispatch(body.into(), &client_ip).await?;
    Ok(Json(result))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/advertising/prediction/advertising",
            post(predict::<AdvertisingRequest>),
        )
        .route("/iris/prediction/iris", post(predict::<IrisRequest>))
        .route("/tensorflow/prediction/comment", post(predict::<CommentRequest>))
        .route("/product-review/llm/chat", post(predict::<ReviewRequest>))
        .with_state(state)
}

pub mod health;
pub mod models;
pub mod predict;
pub mod records;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use modelhub_common::Validate;

use crate::error::GatewayError;

/// JSON body that has also passed its `Validate` checks.
///
/// Malformed JSON, wrong types and range violations are all rejected as
/// `ValidationFailed` before the handler runs.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| GatewayError::ValidationFailed(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Peer address of the connection, or `"unknown"` when the server was not
/// started with connect info.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIp(pub String);

/// Resolve the peer IP through axum's `ConnectInfo` extractor, which also
/// falls back to a `MockConnectInfo` layer.
pub(crate) async fn peer_ip<S>(parts: &mut Parts, state: &S) -> String
where
    S: Send + Sync,
{
    ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
        .await
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(peer_ip(parts, state).await))
    }
}

//! Error taxonomy shared by every model family and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use modelhub_common::ValidationError;

use crate::artifact::{ArtifactError, PredictError};
use crate::llm::ExtractionError;
use crate::preprocess::FamilyMismatch;
use crate::store::StoreError;

/// Request-level failure.
///
/// Only `ValidationFailed` and `NotFound` carry a caller-facing message; for
/// the other kinds the cause is logged and an opaque message is returned.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    ValidationFailed(String),

    #[error("Model artifacts unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("{0}")]
    NotFound(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::ArtifactUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::ValidationFailed(_) => "validation_failed",
            GatewayError::ArtifactUnavailable(_) => "service_unavailable",
            GatewayError::InferenceFailed(_) => "inference_failed",
            GatewayError::ExtractionFailed(_) => "extraction_failed",
            GatewayError::PersistenceFailed(_) => "persistence_failed",
            GatewayError::NotFound(_) => "not_found",
        }
    }

    fn public_message(&self) -> String {
        match self {
            GatewayError::ValidationFailed(msg) | GatewayError::NotFound(msg) => msg.clone(),
            GatewayError::ArtifactUnavailable(_) => {
                "The model for this endpoint is currently unavailable".to_string()
            }
            GatewayError::InferenceFailed(_) => "The model failed to produce a prediction".to_string(),
            GatewayError::ExtractionFailed(_) => {
                "The review could not be analyzed by the text-generation provider".to_string()
            }
            GatewayError::PersistenceFailed(_) => "The prediction could not be recorded".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::ValidationFailed(_) | GatewayError::NotFound(_) => {
                tracing::debug!(error = %self, "Request rejected");
            }
            _ => tracing::error!(error_type = self.error_type(), error = %self, "Request failed"),
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.public_message()
            }
        }));

        (status, body).into_response()
    }
}

impl From<ValidationError> for GatewayError {
    fn from(e: ValidationError) -> Self {
        GatewayError::ValidationFailed(e.to_string())
    }
}

impl From<ArtifactError> for GatewayError {
    fn from(e: ArtifactError) -> Self {
        GatewayError::ArtifactUnavailable(e.to_string())
    }
}

impl From<PredictError> for GatewayError {
    fn from(e: PredictError) -> Self {
        GatewayError::InferenceFailed(e.to_string())
    }
}

impl From<FamilyMismatch> for GatewayError {
    fn from(e: FamilyMismatch) -> Self {
        GatewayError::InferenceFailed(e.to_string())
    }
}

impl From<ExtractionError> for GatewayError {
    fn from(e: ExtractionError) -> Self {
        GatewayError::ExtractionFailed(e.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        GatewayError::PersistenceFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

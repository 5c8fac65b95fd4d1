//! Request schemas accepted by the prediction endpoints.

use serde::{Deserialize, Serialize};

use crate::family::ModelFamily;

/// A request field failed boundary validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Boundary checks run after deserialization and before any inference work.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be a finite number"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::new(field, "must be greater than or equal to 0"));
    }
    Ok(())
}

fn non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Advertising spend per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertisingRequest {
    pub tv: f64,
    pub radio: f64,
    pub newspaper: f64,
}

impl AdvertisingRequest {
    /// Feature vector in the order the regressor was trained on.
    pub fn features(&self) -> Vec<f64> {
        vec![self.tv, self.radio, self.newspaper]
    }
}

impl Validate for AdvertisingRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        non_negative("tv", self.tv)?;
        non_negative("radio", self.radio)?;
        non_negative("newspaper", self.newspaper)
    }
}

/// Iris flower measurements, in centimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrisRequest {
    #[serde(rename = "SepalLengthCm")]
    pub sepal_length: f64,
    #[serde(rename = "SepalWidthCm")]
    pub sepal_width: f64,
    #[serde(rename = "PetalLengthCm")]
    pub petal_length: f64,
    #[serde(rename = "PetalWidthCm")]
    pub petal_width: f64,
}

impl IrisRequest {
    pub fn features(&self) -> Vec<f64> {
        vec![
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }
}

impl Validate for IrisRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        finite("SepalLengthCm", self.sepal_length)?;
        finite("SepalWidthCm", self.sepal_width)?;
        finite("PetalLengthCm", self.petal_length)?;
        finite("PetalWidthCm", self.petal_width)
    }
}

/// Free-text comment for sentiment classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub comment: String,
}

impl Validate for CommentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        non_blank("comment", &self.comment)
    }
}

/// A product review submitted for LLM analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// User information or identifier
    pub user: String,
    /// Product name or identifier
    pub product: String,
    pub review: String,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        non_blank("review", &self.review)
    }
}

/// A validated request for any model family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferenceRequest {
    Advertising(AdvertisingRequest),
    Iris(IrisRequest),
    Comment(CommentRequest),
    Review(ReviewRequest),
}

impl InferenceRequest {
    /// The family that serves this request.
    pub fn family(&self) -> ModelFamily {
        match self {
            InferenceRequest::Advertising(_) => ModelFamily::TabularRegressor,
            InferenceRequest::Iris(_) => ModelFamily::TabularClassifier,
            InferenceRequest::Comment(_) => ModelFamily::SequenceClassifier,
            InferenceRequest::Review(_) => ModelFamily::StructuredExtractor,
        }
    }
}

impl Validate for InferenceRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            InferenceRequest::Advertising(r) => r.validate(),
            InferenceRequest::Iris(r) => r.validate(),
            InferenceRequest::Comment(r) => r.validate(),
            InferenceRequest::Review(r) => r.validate(),
        }
    }
}

impl From<AdvertisingRequest> for InferenceRequest {
    fn from(r: AdvertisingRequest) -> Self {
        InferenceRequest::Advertising(r)
    }
}

impl From<IrisRequest> for InferenceRequest {
    fn from(r: IrisRequest) -> Self {
        InferenceRequest::Iris(r)
    }
}

impl From<CommentRequest> for InferenceRequest {
    fn from(r: CommentRequest) -> Self {
        InferenceRequest::Comment(r)
    }
}

impl From<ReviewRequest> for InferenceRequest {
    fn from(r: ReviewRequest) -> Self {
        InferenceRequest::Review(r)
    }
}

//! ModelHub Common Types
//!
//! Shared types used by the gateway and its clients: model families,
//! request schemas and decoded results.

pub mod family;
pub mod request;
pub mod result;

pub use family::{ArtifactStatus, FamilyInfo, ModelFamily};
pub use request::{
    AdvertisingRequest, CommentRequest, InferenceRequest, IrisRequest, ReviewRequest, Validate,
    ValidationError,
};
pub use result::{DecodedResult, ReviewAnalysis, Sentiment};

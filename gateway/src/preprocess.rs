//! Preprocessing adapters: raw request fields to model input.

use modelhub_common::InferenceRequest;

use crate::artifact::{ArtifactBundle, WordTokenizer};

/// Fixed length of the token sequences the sentiment network was trained on.
pub const SEQUENCE_LENGTH: usize = 100;

/// Id used to right-pad short sequences.
pub const PADDING_ID: u32 = 0;

/// Input in the exact representation an artifact expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    Features(Vec<f64>),
    Tokens(Vec<u32>),
}

/// The request does not belong to the bundle's family.
#[derive(Debug, thiserror::Error)]
#[error("{request} request cannot be prepared for a {bundle} bundle")]
pub struct FamilyMismatch {
    pub request: modelhub_common::ModelFamily,
    pub bundle: modelhub_common::ModelFamily,
}

/// Right-pad with `PADDING_ID` or cut from the end so the sequence is exactly `len` long.
pub fn pad_or_truncate(mut ids: Vec<u32>, len: usize) -> Vec<u32> {
    ids.resize(len, PADDING_ID);
    ids
}

/// Tokenize text into a fixed-length id sequence.
pub fn encode_sequence(tokenizer: &WordTokenizer, text: &str) -> Vec<u32> {
    pad_or_truncate(tokenizer.encode(text), SEQUENCE_LENGTH)
}

/// Transform a validated request using the bundle's companion data.
pub fn prepare(bundle: &ArtifactBundle, request: &InferenceRequest) -> Result<ModelInput, FamilyMismatch> {
    match (bundle, request) {
        (ArtifactBundle::Regressor { .. }, InferenceRequest::Advertising(r)) => {
            Ok(ModelInput::Features(r.features()))
        }
        (ArtifactBundle::Classifier { .. }, InferenceRequest::Iris(r)) => {
            Ok(ModelInput::Features(r.features()))
        }
        (ArtifactBundle::Sequence { tokenizer, .. }, InferenceRequest::Comment(r)) => {
            Ok(ModelInput::Tokens(encode_sequence(tokenizer, &r.comment)))
        }
        _ => Err(FamilyMismatch {
            request: request.family(),
            bundle: bundle.family(),
        }),
    }
}

//! Persistence of completed predictions.

mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde_json::Value;

use modelhub_common::{DecodedResult, InferenceRequest, ModelFamily};

/// One completed inference, ready to be committed.
///
/// The creation timestamp is not part of the record: the store assigns it
/// at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub request: InferenceRequest,
    pub result: DecodedResult,
    pub client_ip: String,
}

impl PredictionRecord {
    pub fn new(request: InferenceRequest, result: DecodedResult, client_ip: impl Into<String>) -> Self {
        Self {
            request,
            result,
            client_ip: client_ip.into(),
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.request.family()
    }
}

/// Receipt for a committed record.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("result does not match a {0} request")]
    Mismatch(ModelFamily),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// Relational store for prediction records.
///
/// Each `insert` is its own transaction covering exactly one record.
pub trait PredictionStore: Send + Sync {
    fn insert(&self, record: &PredictionRecord) -> Result<Committed, StoreError>;

    /// Newest records of a family first, as JSON objects.
    fn recent(&self, family: ModelFamily, limit: usize) -> Result<Vec<Value>, StoreError>;
}

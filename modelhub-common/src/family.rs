//! Model family types for the inference gateway.

use serde::{Deserialize, Serialize};

/// The kinds of model the gateway serves.
///
/// Each family fixes its request shape, its preprocessing adapter and the
/// rule used to decode the model's raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Advertising spend regressor
    TabularRegressor,
    /// Iris species classifier
    TabularClassifier,
    /// Comment sentiment network
    SequenceClassifier,
    /// LLM-backed product review analysis
    StructuredExtractor,
}

impl ModelFamily {
    /// All family variants for iteration.
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::TabularRegressor,
        ModelFamily::TabularClassifier,
        ModelFamily::SequenceClassifier,
        ModelFamily::StructuredExtractor,
    ];

    /// Whether this family is served from a locally loaded artifact.
    pub fn requires_artifact(&self) -> bool {
        !matches!(self, ModelFamily::StructuredExtractor)
    }

    /// Parse the snake_case name used in URLs and logs.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::TabularRegressor => "tabular_regressor",
            ModelFamily::TabularClassifier => "tabular_classifier",
            ModelFamily::SequenceClassifier => "sequence_classifier",
            ModelFamily::StructuredExtractor => "structured_extractor",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load state of a family's artifact bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ArtifactStatus {
    /// Not requested yet, will load on first use
    Unloaded,
    /// Loaded and cached for the rest of the process lifetime
    Loaded,
    /// Load failed; the family stays degraded until restart
    Unavailable {
        message: String,
    },
    /// Served by a remote provider, nothing to load
    Remote,
}

impl ArtifactStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ArtifactStatus::Loaded | ArtifactStatus::Remote)
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, ArtifactStatus::Unavailable { .. })
    }
}

/// Status entry for one family, as reported by `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyInfo {
    pub family: ModelFamily,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

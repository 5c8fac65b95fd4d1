//! Model artifact abstraction layer.
//!
//! This module defines the prediction traits each model family exposes, the
//! `ArtifactBundle` that packages a model with its companion objects, and the
//! `ArtifactSource` that reads bundles from durable storage.

pub mod models;
mod registry;
pub mod tokenizer;

pub use models::{LabelDecoder, RegressorArtifact};
pub use registry::ArtifactRegistry;
pub use tokenizer::WordTokenizer;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use serde::de::DeserializeOwned;

use modelhub_common::ModelFamily;

use crate::config::ArtifactsConfig;
use models::{KnnClassifier, SequenceNetwork};

/// Error raised by a model's own prediction call.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("invalid model input: {0}")]
    InvalidInput(String),
}

/// Continuous-valued model over a fixed-width feature vector.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictError>;
}

/// Model returning an encoded class index.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<usize, PredictError>;
}

/// Model scoring a padded token sequence with a value in [0, 1].
pub trait SequenceScorer: Send + Sync {
    fn score(&self, tokens: &[u32]) -> Result<f64, PredictError>;
}

/// Loaded, ready-to-use state of one artifact-backed family.
///
/// Immutable once built; the registry hands out shared references.
pub enum ArtifactBundle {
    Regressor {
        model: Box<dyn Regressor>,
    },
    Classifier {
        model: Box<dyn Classifier>,
        labels: LabelDecoder,
    },
    Sequence {
        model: Box<dyn SequenceScorer>,
        tokenizer: WordTokenizer,
    },
}

impl ArtifactBundle {
    pub fn family(&self) -> ModelFamily {
        match self {
            ArtifactBundle::Regressor { .. } => ModelFamily::TabularRegressor,
            ArtifactBundle::Classifier { .. } => ModelFamily::TabularClassifier,
            ArtifactBundle::Sequence { .. } => ModelFamily::SequenceClassifier,
        }
    }
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("family", &self.family())
            .finish_non_exhaustive()
    }
}

/// Why a family's bundle could not be loaded.
///
/// Cloneable because the registry caches the failure and hands it to every
/// later caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact file not found: {0}")]
    Missing(String),
    #[error("failed to read artifact {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("corrupt artifact {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("model family {0} has no local artifact")]
    NoArtifact(ModelFamily),
    #[error("artifact load aborted: {0}")]
    Aborted(String),
}

/// Durable storage the registry loads bundles from.
///
/// `load` is blocking; the registry runs it off the async workers.
pub trait ArtifactSource: Send + Sync + 'static {
    fn load(&self, family: ModelFamily) -> Result<ArtifactBundle, ArtifactError>;
}

/// Reads JSON artifacts from a directory on the local filesystem.
pub struct FsArtifactSource {
    config: ArtifactsConfig,
}

impl FsArtifactSource {
    pub fn new(config: ArtifactsConfig) -> Self {
        Self { config }
    }

    fn path(&self, file: &str) -> std::path::PathBuf {
        Path::new(&self.config.dir).join(file)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ArtifactError::Missing(display.clone()),
        _ => ArtifactError::Io {
            path: display.clone(),
            reason: e.to_string(),
        },
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ArtifactError::Corrupt {
        path: display,
        reason: e.to_string(),
    })
}

fn corrupt(path: &Path, reason: String) -> ArtifactError {
    ArtifactError::Corrupt {
        path: path.display().to_string(),
        reason,
    }
}

impl ArtifactSource for FsArtifactSource {
    fn load(&self, family: ModelFamily) -> Result<ArtifactBundle, ArtifactError> {
        let start = Instant::now();
        let bundle = match family {
            ModelFamily::TabularRegressor => {
                let path = self.path(&self.config.regressor_file);
                let artifact: RegressorArtifact = read_json(&path)?;
                artifact.check().map_err(|e| corrupt(&path, e))?;
                ArtifactBundle::Regressor {
                    model: artifact.into_regressor(),
                }
            }
            ModelFamily::TabularClassifier => {
                let model_path = self.path(&self.config.classifier_file);
                let model: KnnClassifier = read_json(&model_path)?;
                model.check().map_err(|e| corrupt(&model_path, e))?;

                let labels_path = self.path(&self.config.label_encoder_file);
                let labels: LabelDecoder = read_json(&labels_path)?;
                labels.check().map_err(|e| corrupt(&labels_path, e))?;
                if model.num_classes() > labels.classes.len() {
                    return Err(corrupt(
                        &labels_path,
                        format!(
                            "{} classes in encoder, model predicts up to {}",
                            labels.classes.len(),
                            model.num_classes()
                        ),
                    ));
                }

                ArtifactBundle::Classifier {
                    model: Box::new(model),
                    labels,
                }
            }
            ModelFamily::SequenceClassifier => {
                let model_path = self.path(&self.config.sequence_model_file);
                let model: SequenceNetwork = read_json(&model_path)?;
                model.check().map_err(|e| corrupt(&model_path, e))?;

                let tokenizer_path = self.path(&self.config.tokenizer_file);
                let tokenizer: WordTokenizer = read_json(&tokenizer_path)?;
                tokenizer.check().map_err(|e| corrupt(&tokenizer_path, e))?;
                if tokenizer.max_token_id() as usize >= model.vocab_size() {
                    return Err(corrupt(
                        &tokenizer_path,
                        format!(
                            "token id {} exceeds embedding vocabulary of {}",
                            tokenizer.max_token_id(),
                            model.vocab_size()
                        ),
                    ));
                }

                ArtifactBundle::Sequence {
                    model: Box::new(model),
                    tokenizer,
                }
            }
            ModelFamily::StructuredExtractor => return Err(ArtifactError::NoArtifact(family)),
        };

        tracing::info!(
            family = %family,
            dir = %self.config.dir,
            elapsed_ms = %start.elapsed().as_millis(),
            "Loaded model artifacts"
        );
        Ok(bundle)
    }
}

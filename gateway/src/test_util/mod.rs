pub mod mock_gemini;

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use modelhub_common::ModelFamily;

use crate::artifact::{ArtifactBundle, ArtifactError, ArtifactSource};
use crate::config::{ArtifactsConfig, Config, LlmConfig};
use crate::llm::{GenerationRequest, ProviderError, TextGenerator};
use crate::store::{Committed, PredictionRecord, PredictionStore, StoreError};

// ============================================================================
// Fixture artifacts
// ============================================================================

pub const IRIS_CLASSES: [&str; 3] = ["Iris-setosa", "Iris-versicolor", "Iris-virginica"];

pub fn regressor_json() -> Value {
    json!({
        "kind": "linear",
        "coefficients": [0.0458, 0.1885, -0.001],
        "intercept": 2.939
    })
}

pub fn classifier_json() -> Value {
    json!({
        "k": 3,
        "points": [
            [5.1, 3.5, 1.4, 0.2], [4.9, 3.0, 1.4, 0.2], [4.7, 3.2, 1.3, 0.2],
            [7.0, 3.2, 4.7, 1.4], [6.4, 3.2, 4.5, 1.5], [6.9, 3.1, 4.9, 1.5],
            [6.3, 3.3, 6.0, 2.5], [5.8, 2.7, 5.1, 1.9], [7.1, 3.0, 5.9, 2.1]
        ],
        "labels": [0, 0, 0, 1, 1, 1, 2, 2, 2]
    })
}

pub fn label_encoder_json() -> Value {
    json!({ "classes": IRIS_CLASSES })
}

pub fn tokenizer_json() -> Value {
    json!({
        "word_index": {
            "<OOV>": 1, "great": 2, "film": 3, "amazing": 4, "love": 5,
            "terrible": 6, "battery": 7, "life": 8, "bad": 9, "good": 10
        },
        "oov_token": "<OOV>"
    })
}

/// One-dimensional embedding where only positive words light up, followed
/// by a single sigmoid unit: positive words score ~0.99, anything else ~0.27.
pub fn sequence_model_json() -> Value {
    json!({
        "embedding": [[0.0], [0.0], [3.0], [0.0], [3.0], [3.0], [0.0], [0.0], [0.0], [0.0], [3.0]],
        "layers": [
            { "weights": [[2.0]], "bias": [-1.0], "activation": "sigmoid" }
        ]
    })
}

/// Write a complete artifact directory using the default file names.
pub fn write_fixture_artifacts(dir: &Path) -> std::io::Result<()> {
    let names = ArtifactsConfig::default();
    let files = [
        (names.regressor_file, regressor_json()),
        (names.classifier_file, classifier_json()),
        (names.label_encoder_file, label_encoder_json()),
        (names.tokenizer_file, tokenizer_json()),
        (names.sequence_model_file, sequence_model_json()),
    ];
    for (name, body) in files {
        std::fs::write(dir.join(name), body.to_string())?;
    }
    Ok(())
}

pub fn fixture_tokenizer() -> crate::artifact::WordTokenizer {
    serde_json::from_value(tokenizer_json()).expect("fixture tokenizer")
}

/// In-memory bundle built from the same fixtures `write_fixture_artifacts` writes.
pub fn fixture_bundle(family: ModelFamily) -> ArtifactBundle {
    use crate::artifact::models::{KnnClassifier, SequenceNetwork};
    use crate::artifact::{LabelDecoder, RegressorArtifact};

    match family {
        ModelFamily::TabularRegressor => {
            let artifact: RegressorArtifact =
                serde_json::from_value(regressor_json()).expect("fixture regressor");
            ArtifactBundle::Regressor {
                model: artifact.into_regressor(),
            }
        }
        ModelFamily::TabularClassifier => {
            let model: KnnClassifier =
                serde_json::from_value(classifier_json()).expect("fixture classifier");
            let labels: LabelDecoder =
                serde_json::from_value(label_encoder_json()).expect("fixture labels");
            ArtifactBundle::Classifier {
                model: Box::new(model),
                labels,
            }
        }
        ModelFamily::SequenceClassifier => {
            let model: SequenceNetwork =
                serde_json::from_value(sequence_model_json()).expect("fixture network");
            ArtifactBundle::Sequence {
                model: Box::new(model),
                tokenizer: fixture_tokenizer(),
            }
        }
        ModelFamily::StructuredExtractor => panic!("{} has no artifact bundle", family),
    }
}

// ============================================================================
// Artifact sources
// ============================================================================

/// Serves fixture bundles and counts loads per family.
pub struct CountingSource {
    loads: Mutex<HashMap<ModelFamily, usize>>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self {
            loads: Mutex::new(HashMap::new()),
        }
    }

    pub fn loads(&self, family: ModelFamily) -> usize {
        self.loads.lock().unwrap().get(&family).copied().unwrap_or(0)
    }
}

impl Default for CountingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSource for CountingSource {
    fn load(&self, family: ModelFamily) -> Result<ArtifactBundle, ArtifactError> {
        if !family.requires_artifact() {
            return Err(ArtifactError::NoArtifact(family));
        }
        *self.loads.lock().unwrap().entry(family).or_insert(0) += 1;
        // Widen the window in which concurrent first accesses overlap.
        std::thread::sleep(Duration::from_millis(20));
        Ok(fixture_bundle(family))
    }
}

/// Every load fails as if the artifact file were absent.
pub struct FailingSource {
    attempts: AtomicUsize,
}

impl FailingSource {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSource for FailingSource {
    fn load(&self, family: ModelFamily) -> Result<ArtifactBundle, ArtifactError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ArtifactError::Missing(format!("saved_models/{}.json", family)))
    }
}

// ============================================================================
// Text generation
// ============================================================================

/// Returns pre-scripted responses in order, recording every prompt.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    async fn generate_json(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(request.user_prompt.clone());
        let next = self.script.lock().unwrap().pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".to_string())))
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Keeps committed records in memory.
pub struct MemoryStore {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionStore for MemoryStore {
    fn insert(&self, record: &PredictionRecord) -> Result<Committed, StoreError> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(Committed {
            id: records.len() as i64,
            created_at: Utc::now(),
        })
    }

    fn recent(&self, family: ModelFamily, limit: usize) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .records()
            .into_iter()
            .rev()
            .filter(|r| r.family() == family)
            .take(limit)
            .map(|r| json!({ "request": r.request, "result": r.result, "client_ip": r.client_ip }))
            .collect())
    }
}

/// Fails every commit and counts the attempts.
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionStore for FailingStore {
    fn insert(&self, _record: &PredictionRecord) -> Result<Committed, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::DatabaseError("disk I/O error".to_string()))
    }

    fn recent(&self, _family: ModelFamily, _limit: usize) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::DatabaseError("disk I/O error".to_string()))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration pointing at a fixture artifact dir, an in-memory database
/// and a mock provider.
pub fn test_config(artifact_dir: &Path, llm_base_url: &str) -> Config {
    Config {
        artifacts: ArtifactsConfig::with_dir(artifact_dir.to_string_lossy()),
        database: crate::config::DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        llm: LlmConfig {
            base_url: llm_base_url.to_string(),
            model: "gemini-test".to_string(),
            api_key: Some("test-key".to_string()),
            timeout_secs: 5,
            ..LlmConfig::default()
        },
        ..Config::default()
    }
}

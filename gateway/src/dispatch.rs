//! Family-agnostic request pipeline: resolve, preprocess, infer, decode, persist.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use modelhub_common::{DecodedResult, InferenceRequest, Sentiment, Validate};

use crate::artifact::{ArtifactBundle, ArtifactRegistry, PredictError};
use crate::error::{GatewayError, Result};
use crate::llm::ReviewAnalyzer;
use crate::preprocess::{self, ModelInput};
use crate::store::{PredictionRecord, PredictionStore};

/// Raw model output before decoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawOutput {
    Value(f64),
    ClassIndex(usize),
    Score(f64),
}

/// Routes validated requests to their family's model and records the outcome.
pub struct Dispatcher {
    registry: Arc<ArtifactRegistry>,
    analyzer: Arc<ReviewAnalyzer>,
    store: Arc<dyn PredictionStore>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ArtifactRegistry>,
        analyzer: Arc<ReviewAnalyzer>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        Self {
            registry,
            analyzer,
            store,
        }
    }

    /// Serve one request end to end.
    ///
    /// The result is only returned once its record is committed.
    pub async fn dispatch(&self, request: InferenceRequest, client_ip: &str) -> Result<DecodedResult> {
        let request_id = Uuid::new_v4();
        let family = request.family();
        let span = tracing::info_span!("dispatch", request_id = %request_id, family = %family);

        async move {
            let start = Instant::now();
            request.validate()?;

            let result = match &request {
                InferenceRequest::Review(review) => {
                    DecodedResult::Review(self.analyzer.analyze(&review.review).await?)
                }
                _ => {
                    let bundle = self.registry.get(family).await?;
                    let input = preprocess::prepare(&bundle, &request)?;
                    let raw = infer(&bundle, &input)?;
                    decode(&bundle, raw)?
                }
            };

            let record = PredictionRecord::new(request, result.clone(), client_ip);
            let store = self.store.clone();
            let committed = tokio::task::spawn_blocking(move || store.insert(&record))
                .await
                .map_err(|e| GatewayError::PersistenceFailed(e.to_string()))??;

            tracing::debug!(
                record_id = committed.id,
                elapsed_ms = %start.elapsed().as_millis(),
                "Prediction served"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GatewayError::InferenceFailed(format!(
            "model produced a non-finite value ({})",
            value
        )))
    }
}

/// Run the bundle's model on prepared input.
///
/// Errors and panics raised by the model both surface as `InferenceFailed`.
pub fn infer(bundle: &ArtifactBundle, input: &ModelInput) -> Result<RawOutput> {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> std::result::Result<RawOutput, PredictError> {
        match (bundle, input) {
            (ArtifactBundle::Regressor { model }, ModelInput::Features(x)) => {
                model.predict(x).map(RawOutput::Value)
            }
            (ArtifactBundle::Classifier { model, .. }, ModelInput::Features(x)) => {
                model.predict(x).map(RawOutput::ClassIndex)
            }
            (ArtifactBundle::Sequence { model, .. }, ModelInput::Tokens(ids)) => {
                model.score(ids).map(RawOutput::Score)
            }
            (bundle, input) => Err(PredictError::InvalidInput(format!(
                "{:?} cannot be fed to a {} model",
                input,
                bundle.family()
            ))),
        }
    }));

    match outcome {
        Ok(Ok(RawOutput::Value(v))) => finite(v).map(RawOutput::Value),
        Ok(Ok(RawOutput::Score(s))) => finite(s).map(RawOutput::Score),
        Ok(Ok(raw)) => Ok(raw),
        Ok(Err(e)) => Err(e.into()),
        Err(payload) => Err(GatewayError::InferenceFailed(format!(
            "model panicked: {}",
            panic_message(&*payload)
        ))),
    }
}

/// Turn raw model output into the family's public result.
pub fn decode(bundle: &ArtifactBundle, raw: RawOutput) -> Result<DecodedResult> {
    match (bundle, raw) {
        (ArtifactBundle::Regressor { .. }, RawOutput::Value(prediction)) => {
            Ok(DecodedResult::Regression { prediction })
        }
        (ArtifactBundle::Classifier { labels, .. }, RawOutput::ClassIndex(index)) => labels
            .decode(index)
            .map(|label| DecodedResult::Classification {
                prediction: label.to_string(),
            })
            .ok_or_else(|| {
                GatewayError::InferenceFailed(format!("class index {} has no label", index))
            }),
        (ArtifactBundle::Sequence { .. }, RawOutput::Score(score)) => Ok(DecodedResult::Sentiment {
            sentiment: Sentiment::from_score(score),
        }),
        (bundle, raw) => Err(GatewayError::InferenceFailed(format!(
            "{:?} is not an output of a {} model",
            raw,
            bundle.family()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use modelhub_common::{AdvertisingRequest, CommentRequest, IrisRequest, ModelFamily, ReviewRequest};
    use rstest::rstest;

    use crate::artifact::{ArtifactSource, LabelDecoder, Regressor};
    use crate::llm::RetryPolicy;
    use crate::test_util::{self, CountingSource, FailingSource, FailingStore, MemoryStore, ScriptedGenerator};

    fn analyzer(responses: Vec<&str>) -> Arc<ReviewAnalyzer> {
        let generator = ScriptedGenerator::new(responses.into_iter().map(|r| Ok(r.to_string())).collect());
        Arc::new(ReviewAnalyzer::new(
            Arc::new(generator),
            Duration::from_secs(1),
            RetryPolicy::none(),
        ))
    }

    fn dispatcher(source: Arc<dyn ArtifactSource>, store: Arc<dyn PredictionStore>) -> Dispatcher {
        Dispatcher::new(
            Arc::new(ArtifactRegistry::new(source)),
            analyzer(vec![r#"{"rating": 4, "sentiment": "positive", "key_points": ["great quality", "pricey"]}"#]),
            store,
        )
    }

    fn advertising() -> InferenceRequest {
        AdvertisingRequest {
            tv: 230.1,
            radio: 37.8,
            newspaper: 69.2,
        }
        .into()
    }

    struct PanickingRegressor;

    impl Regressor for PanickingRegressor {
        fn predict(&self, _features: &[f64]) -> std::result::Result<f64, PredictError> {
            panic!("weights went missing")
        }
    }

    struct NanRegressor;

    impl Regressor for NanRegressor {
        fn predict(&self, _features: &[f64]) -> std::result::Result<f64, PredictError> {
            Ok(f64::NAN)
        }
    }

    #[rstest]
    #[case(0.0, Sentiment::Negative)]
    #[case(0.5, Sentiment::Negative)]
    #[case(0.50001, Sentiment::Positive)]
    #[case(1.0, Sentiment::Positive)]
    fn test_decode_sentiment_boundary(#[case] score: f64, #[case] expected: Sentiment) {
        let bundle = test_util::fixture_bundle(ModelFamily::SequenceClassifier);
        assert_eq!(
            decode(&bundle, RawOutput::Score(score)).unwrap(),
            DecodedResult::Sentiment { sentiment: expected }
        );
    }

    #[test]
    fn test_decode_unknown_class_index() {
        let bundle = ArtifactBundle::Classifier {
            model: Box::new(crate::artifact::models::KnnClassifier {
                k: 1,
                points: vec![vec![0.0]],
                labels: vec![0],
            }),
            labels: LabelDecoder {
                classes: vec!["only".to_string()],
            },
        };
        assert!(matches!(
            decode(&bundle, RawOutput::ClassIndex(3)),
            Err(GatewayError::InferenceFailed(_))
        ));
    }

    #[test]
    fn test_infer_catches_model_panic() {
        let bundle = ArtifactBundle::Regressor {
            model: Box::new(PanickingRegressor),
        };
        let err = infer(&bundle, &ModelInput::Features(vec![1.0, 2.0, 3.0])).unwrap_err();
        match err {
            GatewayError::InferenceFailed(msg) => assert!(msg.contains("weights went missing")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_infer_rejects_non_finite_output() {
        let bundle = ArtifactBundle::Regressor {
            model: Box::new(NanRegressor),
        };
        assert!(matches!(
            infer(&bundle, &ModelInput::Features(vec![1.0, 2.0, 3.0])),
            Err(GatewayError::InferenceFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_regression_is_persisted_with_client_ip() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(Arc::new(CountingSource::new()), store.clone());

        let result = dispatcher.dispatch(advertising(), "10.1.2.3").await.unwrap();
        match result {
            DecodedResult::Regression { prediction } => assert!(prediction.is_finite()),
            other => panic!("unexpected result {:?}", other),
        }

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request, advertising());
        assert_eq!(records[0].client_ip, "10.1.2.3");
    }

    #[tokio::test]
    async fn test_tabular_predictions_are_deterministic() {
        let dispatcher = dispatcher(Arc::new(CountingSource::new()), Arc::new(MemoryStore::new()));
        let first = dispatcher.dispatch(advertising(), "a").await.unwrap();
        let second = dispatcher.dispatch(advertising(), "b").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_classification_returns_known_label() {
        let dispatcher = dispatcher(Arc::new(CountingSource::new()), Arc::new(MemoryStore::new()));
        let request = IrisRequest {
            sepal_length: 5.1,
            sepal_width: 3.5,
            petal_length: 1.4,
            petal_width: 0.2,
        };
        let result = dispatcher.dispatch(request.into(), "ip").await.unwrap();
        assert_eq!(
            result,
            DecodedResult::Classification {
                prediction: "Iris-setosa".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_negative_comment() {
        let dispatcher = dispatcher(Arc::new(CountingSource::new()), Arc::new(MemoryStore::new()));
        let request = CommentRequest {
            comment: "terrible battery life".to_string(),
        };
        let result = dispatcher.dispatch(request.into(), "ip").await.unwrap();
        assert_eq!(
            result,
            DecodedResult::Sentiment {
                sentiment: Sentiment::Negative
            }
        );
    }

    #[tokio::test]
    async fn test_review_goes_to_analyzer() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(Arc::new(FailingSource::new()), store.clone());
        let request = ReviewRequest {
            user: "john_doe".to_string(),
            product: "Headphones".to_string(),
            review: "Amazing product! Great quality, but pricey.".to_string(),
        };

        let result = dispatcher.dispatch(request.into(), "ip").await.unwrap();
        match result {
            DecodedResult::Review(analysis) => assert_eq!(analysis.rating, Some(4)),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_artifact_skips_persistence() {
        let store = Arc::new(FailingStore::new());
        let source = Arc::new(FailingSource::new());
        let dispatcher = dispatcher(source.clone(), store.clone());

        for _ in 0..3 {
            let err = dispatcher.dispatch(advertising(), "ip").await.unwrap_err();
            assert!(matches!(err, GatewayError::ArtifactUnavailable(_)));
        }
        assert_eq!(source.attempts(), 1);
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_withholds_prediction() {
        let store = Arc::new(FailingStore::new());
        let dispatcher = dispatcher(Arc::new(CountingSource::new()), store.clone());

        let err = dispatcher.dispatch(advertising(), "ip").await.unwrap_err();
        assert!(matches!(err, GatewayError::PersistenceFailed(_)));
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_inference() {
        let source = Arc::new(CountingSource::new());
        let dispatcher = dispatcher(source.clone(), Arc::new(MemoryStore::new()));
        let request = AdvertisingRequest {
            tv: -1.0,
            radio: 0.0,
            newspaper: 0.0,
        };

        let err = dispatcher.dispatch(request.into(), "ip").await.unwrap_err();
        assert!(matches!(err, GatewayError::ValidationFailed(_)));
        assert_eq!(source.loads(ModelFamily::TabularRegressor), 0);
    }
}

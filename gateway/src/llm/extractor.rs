//! Schema-enforcing review analysis on top of a `TextGenerator`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use modelhub_common::{ReviewAnalysis, Sentiment};

use super::{GenerationRequest, ProviderError, TextGenerator};
use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str =
    "Analyze product reviews and extract structured data (sentiment, rating, key points).";

const MAX_KEY_POINT_WORDS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("provider response violates the review schema: {0}")]
    Schema(String),
}

/// Retry-with-backoff applied to transient provider failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): doubling, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy {
    fn from(config: &crate::config::RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Review analysis schema sent to the provider.
fn review_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "rating": {
                "type": "INTEGER",
                "nullable": true,
                "description": "The rating of the product (1-5)"
            },
            "sentiment": {
                "type": "STRING",
                "enum": ["positive", "negative"],
                "description": "The sentiment of the review"
            },
            "key_points": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Key points from the review. Lowercase, 1-3 words each."
            }
        },
        "required": ["sentiment", "key_points"]
    })
}

/// Untyped view of the provider output, so every field can be checked explicitly.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    rating: Option<Value>,
    #[serde(default)]
    sentiment: Option<Value>,
    #[serde(default)]
    key_points: Option<Value>,
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse and validate provider output into a `ReviewAnalysis`.
///
/// Either every field conforms or the whole response is rejected. At least
/// one key point is required; the number of points is not capped, only the
/// words per point.
pub fn parse_analysis(text: &str) -> Result<ReviewAnalysis, ExtractionError> {
    let schema_err = |msg: String| ExtractionError::Schema(msg);

    let raw: RawAnalysis = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| schema_err(format!("not a JSON object: {}", e)))?;

    let sentiment = match raw.sentiment {
        Some(Value::String(s)) => s.parse::<Sentiment>().map_err(schema_err)?,
        Some(other) => return Err(schema_err(format!("sentiment is not a string: {}", other))),
        None => return Err(schema_err("sentiment is missing".to_string())),
    };

    let rating = match raw.rating {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => {
            let value = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| schema_err(format!("rating {} is not a whole number", n)))?;
            if !(1..=5).contains(&value) {
                return Err(schema_err(format!("rating {} is outside 1-5", value)));
            }
            Some(value as u8)
        }
        Some(other) => return Err(schema_err(format!("rating is not a number: {}", other))),
    };

    let items = match raw.key_points {
        Some(Value::Array(items)) => items,
        Some(other) => return Err(schema_err(format!("key_points is not a list: {}", other))),
        None => return Err(schema_err("key_points is missing".to_string())),
    };
    if items.is_empty() {
        return Err(schema_err("key_points is empty".to_string()));
    }

    let mut key_points = Vec::with_capacity(items.len());
    for item in items {
        let phrase = match item {
            Value::String(s) => s.trim().to_lowercase(),
            other => return Err(schema_err(format!("key point is not a string: {}", other))),
        };
        let words = phrase.split_whitespace().count();
        if words == 0 || words > MAX_KEY_POINT_WORDS {
            return Err(schema_err(format!(
                "key point '{}' must have 1-{} words",
                phrase, MAX_KEY_POINT_WORDS
            )));
        }
        key_points.push(phrase);
    }

    Ok(ReviewAnalysis {
        rating,
        sentiment,
        key_points,
    })
}

/// Structured extraction client for product reviews.
///
/// Wraps a `TextGenerator` with a per-attempt timeout, the retry policy and
/// local schema validation. Holds no locks across the provider call.
pub struct ReviewAnalyzer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ReviewAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            generator,
            timeout,
            retry,
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &LlmConfig) -> Self {
        Self::new(generator, config.timeout(), RetryPolicy::from(&config.retry))
    }

    fn request_for(review: &str) -> GenerationRequest {
        GenerationRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: format!("Analyze this review: '{}'", review),
            response_schema: review_schema(),
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.timeout, self.generator.generate_json(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    /// Analyze one review, returning only schema-conformant results.
    pub async fn analyze(&self, review: &str) -> Result<ReviewAnalysis, ExtractionError> {
        let request = Self::request_for(review);
        let mut attempt = 0;

        let text = loop {
            match self.attempt(&request).await {
                Ok(text) => break text,
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        provider = self.generator.provider(),
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let analysis = parse_analysis(&text)?;
        tracing::debug!(
            provider = self.generator.provider(),
            rating = ?analysis.rating,
            sentiment = %analysis.sentiment,
            "Review analyzed"
        );
        Ok(analysis)
    }
}

//! Decoded, domain-level prediction results.

use serde::{Deserialize, Serialize};

/// Binary sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// Decode a probability-like score. Only scores strictly above 0.5 are positive.
    pub fn from_score(score: f64) -> Self {
        if score > 0.5 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

/// Structured analysis of a product review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    /// The rating of the product (1-5), if the review implies one
    pub rating: Option<u8>,
    pub sentiment: Sentiment,
    /// Key points from the review. Lowercase, 1-3 words each.
    pub key_points: Vec<String>,
}

/// Output of one completed inference, shaped as the endpoint returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecodedResult {
    Regression { prediction: f64 },
    Classification { prediction: String },
    Sentiment { sentiment: Sentiment },
    Review(ReviewAnalysis),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_boundary() {
        assert_eq!(Sentiment::from_score(0.5), Sentiment::Negative);
        assert_eq!(Sentiment::from_score(0.50001), Sentiment::Positive);
        assert_eq!(Sentiment::from_score(0.0), Sentiment::Negative);
        assert_eq!(Sentiment::from_score(1.0), Sentiment::Positive);
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!("positive".parse::<Sentiment>(), Ok(Sentiment::Positive));
        assert_eq!("negative".parse::<Sentiment>(), Ok(Sentiment::Negative));
        assert!("Positive".parse::<Sentiment>().is_err());
        assert!("neutral".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_decoded_result_shapes() {
        let json = serde_json::to_value(DecodedResult::Regression { prediction: 12.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"prediction": 12.5}));

        let json = serde_json::to_value(DecodedResult::Classification {
            prediction: "Iris-setosa".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"prediction": "Iris-setosa"}));

        let json = serde_json::to_value(DecodedResult::Sentiment {
            sentiment: Sentiment::Negative,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"sentiment": "negative"}));
    }

    #[test]
    fn test_review_result_keeps_null_rating() {
        let result = DecodedResult::Review(ReviewAnalysis {
            rating: None,
            sentiment: Sentiment::Positive,
            key_points: vec!["great quality".to_string()],
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rating": null,
                "sentiment": "positive",
                "key_points": ["great quality"]
            })
        );
    }
}

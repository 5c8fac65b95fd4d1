//! Remote text generation and structured review extraction.

mod extractor;
mod gemini;

pub use extractor::{parse_analysis, ExtractionError, RetryPolicy, ReviewAnalyzer};
pub use gemini::GeminiClient;

use async_trait::async_trait;

/// A single JSON-mode generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Schema the provider is asked to follow. Output is still validated locally.
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("provider rejected the credential ({0})")]
    Unauthorized(u16),
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Transport(_) | ProviderError::RateLimited => {
                true
            }
            ProviderError::Status { status, .. } => *status >= 500,
            ProviderError::Unauthorized(_) | ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// Text-generation provider returning raw JSON text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier used in logs (e.g., "gemini").
    fn provider(&self) -> &'static str;

    async fn generate_json(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Transport("reset".to_string()).is_transient());
        assert!(ProviderError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!ProviderError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!ProviderError::Unauthorized(401).is_transient());
        assert!(!ProviderError::InvalidResponse("x".to_string()).is_transient());
    }
}

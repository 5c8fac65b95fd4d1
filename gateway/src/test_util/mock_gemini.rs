use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockGeminiResponse {
    pub candidates: Vec<MockCandidate>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockCandidate {
    pub content: MockContent,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MockContent {
    pub role: String,
    pub parts: Vec<MockPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MockPart {
    pub text: String,
}

impl MockGeminiResponse {
    pub fn simple_text(text: &str) -> Self {
        Self {
            candidates: vec![MockCandidate {
                content: MockContent {
                    role: "model".to_string(),
                    parts: vec![MockPart {
                        text: text.to_string(),
                    }],
                },
                finish_reason: "STOP".to_string(),
            }],
            model_version: Some("gemini-test".to_string()),
        }
    }
}

/// Successful `generateContent` body whose single candidate carries `text`.
pub fn candidate_json(text: &str) -> serde_json::Value {
    serde_json::to_value(MockGeminiResponse::simple_text(text)).unwrap_or_default()
}

/// Error body in the shape the Generative Language API returns.
pub fn error_json(code: u16, message: &str) -> serde_json::Value {
    let status = match code {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        429 => "RESOURCE_EXHAUSTED",
        _ => "INTERNAL",
    };
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "status": status
        }
    })
}

/// A conformant review analysis, as the provider would return it in JSON mode.
pub fn review_analysis_text() -> String {
    r#"{"rating": 4, "sentiment": "positive", "key_points": ["great quality", "pricey"]}"#.to_string()
}

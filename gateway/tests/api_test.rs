use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::MockConnectInfo;
use http::StatusCode;
use modelhub_common::ModelFamily;
use modelhub_gateway::test_util::{self, mock_gemini};
use modelhub_gateway::{app, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-test:generateContent";

struct TestApp {
    router: axum::Router,
    state: Arc<AppState>,
    provider: MockServer,
    _artifacts: TempDir,
}

async fn setup(with_artifacts: bool) -> TestApp {
    let artifacts = tempfile::tempdir().unwrap();
    if with_artifacts {
        test_util::write_fixture_artifacts(artifacts.path()).unwrap();
    }
    let provider = MockServer::start().await;

    let config = test_util::test_config(artifacts.path(), &provider.uri());
    let state = Arc::new(AppState::from_config(config).unwrap());
    let router = app(state.clone()).layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4321))));

    TestApp {
        router,
        state,
        provider,
        _artifacts: artifacts,
    }
}

async fn send_request(app: &axum::Router, method: http::Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut req_builder = http::Request::builder().method(method).uri(uri);
    if body.is_some() {
        req_builder = req_builder.header("Content-Type", "application/json");
    }
    let req = req_builder
        .body(match body {
            Some(b) => axum::body::Body::from(b),
            None => axum::body::Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_request(app, http::Method::POST, uri, Some(body.to_string())).await
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send_request(app, http::Method::GET, uri, None).await
}

fn recent(app: &TestApp, family: ModelFamily) -> Vec<Value> {
    app.state.store.recent(family, 50).unwrap()
}

#[tokio::test]
async fn test_root_and_health() {
    let app = setup(true).await;

    let (status, body) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "online"}));

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_advertising_prediction_is_persisted() {
    let app = setup(true).await;

    let (status, body) = post(
        &app.router,
        "/advertising/prediction/advertising",
        json!({"tv": 230.1, "radio": 37.8, "newspaper": 69.2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_f64().unwrap();
    assert!(prediction.is_finite());

    let rows = recent(&app, ModelFamily::TabularRegressor);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["tv"], 230.1);
    assert_eq!(rows[0]["radio"], 37.8);
    assert_eq!(rows[0]["newspaper"], 69.2);
    assert_eq!(rows[0]["prediction"], prediction);
    assert_eq!(rows[0]["client_ip"], "10.0.0.7");
    assert!(rows[0]["prediction_time"].is_string());
}

#[tokio::test]
async fn test_advertising_prediction_is_deterministic() {
    let app = setup(true).await;
    let input = json!({"tv": 44.5, "radio": 39.3, "newspaper": 45.1});

    let (_, first) = post(&app.router, "/advertising/prediction/advertising", input.clone()).await;
    let (_, second) = post(&app.router, "/advertising/prediction/advertising", input).await;
    assert_eq!(first, second);
    assert_eq!(recent(&app, ModelFamily::TabularRegressor).len(), 2);
}

#[tokio::test]
async fn test_iris_prediction_is_a_known_label() {
    let app = setup(true).await;

    let (status, body) = post(
        &app.router,
        "/iris/prediction/iris",
        json!({"SepalLengthCm": 5.1, "SepalWidthCm": 3.5, "PetalLengthCm": 1.4, "PetalWidthCm": 0.2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let label = body["prediction"].as_str().unwrap();
    assert!(test_util::IRIS_CLASSES.contains(&label));
    assert_eq!(label, "Iris-setosa");

    let rows = recent(&app, ModelFamily::TabularClassifier);
    assert_eq!(rows[0]["sepal_length"], 5.1);
    assert_eq!(rows[0]["prediction"], "Iris-setosa");
}

#[tokio::test]
async fn test_comment_sentiment() {
    let app = setup(true).await;

    let (status, body) = post(
        &app.router,
        "/tensorflow/prediction/comment",
        json!({"comment": "terrible battery life"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"sentiment": "negative"}));

    let (_, body) = post(
        &app.router,
        "/tensorflow/prediction/comment",
        json!({"comment": "I love this great film"}),
    )
    .await;
    assert_eq!(body, json!({"sentiment": "positive"}));

    let rows = recent(&app, ModelFamily::SequenceClassifier);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["comment"], "I love this great film");
    assert_eq!(rows[1]["sentiment"], "negative");
}

#[tokio::test]
async fn test_product_review_analysis() {
    let app = setup(true).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_gemini::candidate_json(&mock_gemini::review_analysis_text())),
        )
        .expect(1)
        .mount(&app.provider)
        .await;

    let (status, body) = post(
        &app.router,
        "/product-review/llm/chat",
        json!({
            "user": "john_doe",
            "product": "Headphones",
            "review": "Amazing product! Great quality, but pricey."
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rating = body["rating"].as_u64().unwrap();
    assert!((1..=5).contains(&rating));
    assert!(["positive", "negative"].contains(&body["sentiment"].as_str().unwrap()));
    for point in body["key_points"].as_array().unwrap() {
        let words = point.as_str().unwrap().split_whitespace().count();
        assert!((1..=3).contains(&words));
    }

    let rows = recent(&app, ModelFamily::StructuredExtractor);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_info"], "john_doe");
    assert_eq!(rows[0]["product"], "Headphones");
    assert_eq!(rows[0]["rate"], 4);
    assert_eq!(rows[0]["key_points"], json!(["great quality", "pricey"]));
    assert_eq!(rows[0]["client_ip"], "10.0.0.7");
}

#[tokio::test]
async fn test_nonconformant_provider_output_is_rejected() {
    let app = setup(true).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_gemini::candidate_json(
            r#"{"rating": 9, "sentiment": "positive", "key_points": []}"#,
        )))
        .mount(&app.provider)
        .await;

    let (status, body) = post(
        &app.router,
        "/product-review/llm/chat",
        json!({"user": "u", "product": "p", "review": "fine"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "extraction_failed");
    assert!(recent(&app, ModelFamily::StructuredExtractor).is_empty());
}

#[tokio::test]
async fn test_provider_auth_failure_is_extraction_failure() {
    let app = setup(true).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(mock_gemini::error_json(401, "API key not valid")))
        .mount(&app.provider)
        .await;

    let (status, body) = post(
        &app.router,
        "/product-review/llm/chat",
        json!({"user": "u", "product": "p", "review": "fine"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["error"]["message"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn test_missing_artifacts_make_family_unavailable() {
    let app = setup(false).await;

    for _ in 0..2 {
        let (status, body) = post(
            &app.router,
            "/advertising/prediction/advertising",
            json!({"tv": 1.0, "radio": 2.0, "newspaper": 3.0}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "service_unavailable");
    }
    assert!(recent(&app, ModelFamily::TabularRegressor).is_empty());

    let (_, models) = get(&app.router, "/models").await;
    let regressor = models["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["family"] == "tabular_regressor")
        .unwrap();
    assert_eq!(regressor["status"], "unavailable");
}

#[tokio::test]
async fn test_validation_failures() {
    let app = setup(true).await;

    let cases = [
        ("/advertising/prediction/advertising", json!({"tv": -1.0, "radio": 2.0, "newspaper": 3.0}).to_string(), Some("tv")),
        ("/advertising/prediction/advertising", json!({"tv": "lots", "radio": 2.0, "newspaper": 3.0}).to_string(), None),
        ("/advertising/prediction/advertising", "{not json".to_string(), None),
        ("/iris/prediction/iris", json!({"SepalLengthCm": 5.1}).to_string(), None),
        ("/tensorflow/prediction/comment", json!({"comment": "   "}).to_string(), Some("comment")),
        ("/product-review/llm/chat", json!({"user": "u", "product": "p", "review": ""}).to_string(), Some("review")),
    ];

    for (uri, body, field) in cases {
        let (status, response) = send_request(&app.router, http::Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        assert_eq!(response["error"]["type"], "validation_failed");
        if let Some(field) = field {
            assert!(response["error"]["message"].as_str().unwrap().contains(field));
        }
    }

    assert!(recent(&app, ModelFamily::TabularRegressor).is_empty());
    assert!(app.provider.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_models_report_lazy_loading() {
    let app = setup(true).await;

    let (status, body) = get(&app.router, "/models").await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<(String, String)> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["family"].as_str().unwrap().to_string(), m["status"].as_str().unwrap().to_string()))
        .collect();
    assert!(statuses.contains(&("tabular_regressor".to_string(), "unloaded".to_string())));
    assert!(statuses.contains(&("structured_extractor".to_string(), "remote".to_string())));

    post(
        &app.router,
        "/advertising/prediction/advertising",
        json!({"tv": 1.0, "radio": 2.0, "newspaper": 3.0}),
    )
    .await;
    let (_, body) = get(&app.router, "/models").await;
    assert_eq!(body["data"][0]["family"], "tabular_regressor");
    assert_eq!(body["data"][0]["status"], "loaded");
}

#[tokio::test]
async fn test_records_endpoint() {
    let app = setup(true).await;
    for tv in [10.0, 20.0, 30.0] {
        post(
            &app.router,
            "/advertising/prediction/advertising",
            json!({"tv": tv, "radio": 1.0, "newspaper": 1.0}),
        )
        .await;
    }

    let (status, body) = get(&app.router, "/records/tabular_regressor?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["family"], "tabular_regressor");
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["tv"], 30.0);
    assert_eq!(records[1]["tv"], 20.0);

    let (status, body) = get(&app.router, "/records/sequence_classifier").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["records"].as_array().unwrap().is_empty());

    let (status, body) = get(&app.router, "/records/bogus").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

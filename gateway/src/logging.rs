//! Tracing setup and per-request access logging.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. several tests in one binary) is a no-op.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Middleware that logs every HTTP request at INFO level.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let (mut parts, body) = request.into_parts();
    let peer = crate::routes::peer_ip(&mut parts, &()).await;

    let response = next.run(Request::from_parts(parts, body)).await;

    let status = response.status();
    let elapsed = start.elapsed();

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            client_ip = %peer,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "HTTP request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            client_ip = %peer,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "HTTP request"
        );
    }

    response
}

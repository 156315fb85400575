//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "tlearn_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "tlearn_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "tlearn_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "tlearn_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse IDs in paths so metric cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = Regex::new(r"/videos/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(path, "/videos/:youtube_id");
    let path = Regex::new(r"/summaries/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/summaries/:summary_id");
    let path = Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .unwrap()
        .replace_all(&path, ":id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/videos/dQw4w9WgXcQ/summaries/550e8400-e29b-41d4-a716-446655440000"),
            "/api/videos/:youtube_id/summaries/:summary_id"
        );
        assert_eq!(
            sanitize_path("/api/summaries/abc-123/translate"),
            "/api/summaries/:summary_id/translate"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}

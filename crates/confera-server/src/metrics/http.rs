//! Per-route request counter and latency histogram.

use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};

pub const HTTP_REQUESTS: &str = "confera_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "confera_http_request_duration_seconds";

/// Label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Registra las metricas HTTP
pub fn register_http_metrics() {
    metrics::describe_counter!(HTTP_REQUESTS, "HTTP requests by method, route and status");
    metrics::describe_histogram!(
        HTTP_REQUEST_DURATION,
        metrics::Unit::Seconds,
        "HTTP request latency by method and route"
    );
}

/// Records every request under its route template.
///
/// `/cache/{namespace}` is recorded as such, never with the concrete
/// namespace, and unknown paths collapse into one label.
pub async fn http_metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = route_label(matched_path.as_ref());
    let method = request.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = started.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS, "method" => method.clone(), "path" => route.clone(), "status" => status)
        .increment(1);
    histogram!(HTTP_REQUEST_DURATION, "method" => method, "path" => route).record(elapsed);

    response
}

fn route_label(matched_path: Option<&MatchedPath>) -> String {
    matched_path.map_or_else(|| UNMATCHED_ROUTE.to_owned(), |p| p.as_str().to_owned())
}

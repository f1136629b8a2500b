use crate::metrics::MetricsState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Per-request counter and latency histogram, labelled by matched route so
/// path parameters and unknown paths do not explode label cardinality.
pub async fn metrics_middleware(
    State(metrics): State<MetricsState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics.http_request(
        method,
        route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

//! Request metrics middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use papershelf_common::metrics::RequestMetrics;

/// Record count and latency for every request
///
/// The endpoint label uses the route template (`/api/papers/{id}`)
/// rather than the raw path, so label cardinality stays bounded.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();

    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let recorder = RequestMetrics::start(&method, &endpoint);

    let response = next.run(request).await;

    recorder.finish(response.status().as_u16());

    response
}

//! Liveness bypass.
//!
//! Answers the liveness path directly so orchestration probes never reach
//! health checks or the wrapped service.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Middleware function: fixed `200` with `Cache-Control: no-cache` on `path`,
/// any method.
pub async fn liveness_bypass(
    State(path): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == &*path {
        return (StatusCode::OK, [(header::CACHE_CONTROL, "no-cache")]).into_response();
    }

    next.run(request).await
}

//! Wrapped service adapter.
//!
//! Forwards requests that made it through the middleware chain to the
//! upstream service and streams its response back unchanged.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower_http::timeout::TimeoutLayer;

use crate::observability::metrics;

/// Upstream forwarding state.
#[derive(Clone)]
pub struct Upstream {
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl Upstream {
    pub fn new(authority: Authority) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { authority, client }
    }

    /// Router forwarding every path to the upstream, bounded by `timeout`.
    ///
    /// An upstream that does not answer in time yields `504 Gateway Timeout`.
    pub fn into_router(self, timeout: Duration) -> Router {
        Router::new()
            .fallback(forward)
            .with_state(self)
            .layer(TimeoutLayer::with_status_code(StatusCode::GATEWAY_TIMEOUT, timeout))
    }

    fn rewrite(&self, uri: &Uri) -> Uri {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

/// Forward one request to the upstream.
async fn forward(State(upstream): State<Upstream>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    parts.uri = upstream.rewrite(&parts.uri);
    let request = Request::from_parts(parts, body);

    match upstream.client.request(request).await {
        Ok(response) => {
            let status = response.status();
            tracing::debug!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upstream responded"
            );
            metrics::record_upstream(status.as_u16());

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(
                method = %method,
                path = %path,
                upstream = %upstream.authority,
                error = %e,
                "Upstream error"
            );
            metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_keeps_path_and_query() {
        let upstream = Upstream::new(Authority::from_static("registry:5000"));
        let uri: Uri = "/v2/library/alpine/manifests/latest?n=10".parse().unwrap();

        assert_eq!(
            upstream.rewrite(&uri).to_string(),
            "http://registry:5000/v2/library/alpine/manifests/latest?n=10"
        );
    }

    #[test]
    fn test_rewrite_replaces_absolute_authority() {
        let upstream = Upstream::new(Authority::from_static("127.0.0.1:5000"));
        let uri: Uri = "http://gate.example:8080/v2/".parse().unwrap();

        assert_eq!(upstream.rewrite(&uri).to_string(), "http://127.0.0.1:5000/v2/");
    }
}

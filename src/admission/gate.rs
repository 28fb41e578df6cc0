//! Admission gate middleware.
//!
//! Requests to the control path view or replace the quota. Requests to the
//! liveness path pass straight through so probes never touch the quota.
//! Everything else spends one unit or is turned away with 429.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};

use crate::admission::control::{parse_quota, render_page};
use crate::admission::quota::Quota;
use crate::config::AdmissionConfig;
use crate::observability::metrics;

/// Shared state of the admission gate.
#[derive(Debug)]
pub struct AdmissionGate {
    quota: Arc<Quota>,
    control_path: String,
    form_field: String,
    exempt_path: Option<String>,
    retry_after: HeaderValue,
}

impl AdmissionGate {
    pub fn new(quota: Arc<Quota>, config: &AdmissionConfig) -> Self {
        Self {
            quota,
            control_path: config.control_path.clone(),
            form_field: config.form_field.clone(),
            exempt_path: None,
            retry_after: HeaderValue::from(config.retry_after_secs),
        }
    }

    /// Let requests to `path` through without consulting the quota.
    pub fn exempt(mut self, path: impl Into<String>) -> Self {
        self.exempt_path = Some(path.into());
        self
    }

    fn reject(&self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, self.retry_after.clone())],
        )
            .into_response()
    }

    async fn control(&self, request: Request<Body>) -> Response {
        let mut problem = None;

        if request.method() == Method::POST {
            let raw = self.submitted_value(request).await;
            match parse_quota(&raw) {
                Ok(value) => {
                    let previous = self.quota.get();
                    self.quota.set(value);
                    metrics::record_quota_set(value);
                    tracing::info!(previous, quota = value, "Quota updated");
                    return Redirect::to(&self.control_path).into_response();
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Rejected quota input");
                    problem = Some(e);
                }
            }
        }

        Html(render_page(
            self.quota.get(),
            problem.as_ref(),
            &self.control_path,
            &self.form_field,
        ))
        .into_response()
    }

    /// First value of the configured form field, or empty when the body is
    /// not a form or lacks the field.
    async fn submitted_value(&self, request: Request<Body>) -> String {
        match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(fields)) => fields
                .into_iter()
                .find(|(name, _)| *name == self.form_field)
                .map(|(_, value)| value)
                .unwrap_or_default(),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Control form not readable");
                String::new()
            }
        }
    }
}

/// Middleware function applying the admission policy.
pub async fn admission_gate(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();

    if path == gate.control_path {
        return gate.control(request).await;
    }
    if gate.exempt_path.as_deref() == Some(path) {
        return next.run(request).await;
    }

    if gate.quota.accept_request() {
        metrics::record_admission(true);
        next.run(request).await
    } else {
        metrics::record_admission(false);
        tracing::warn!(path = %path, method = %request.method(), "Quota exhausted, request rejected");
        gate.reject()
    }
}

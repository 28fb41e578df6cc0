//! Health check registry and middleware.
//!
//! Checks are registered by name. While any of them fails, every request
//! reaching the middleware is answered with `503` and a JSON object mapping
//! failing check names to their error text.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// A single health check.
pub trait Checker: Send + Sync {
    fn check(&self) -> Result<(), String>;
}

/// Named set of health checks.
#[derive(Default)]
pub struct HealthRegistry {
    checks: RwLock<BTreeMap<String, Arc<dyn Checker>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `checker` under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, checker: Arc<dyn Checker>) {
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        checks.insert(name.into(), checker);
    }

    /// Run every check and collect the failures.
    pub fn failures(&self) -> BTreeMap<String, String> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        checks
            .iter()
            .filter_map(|(name, checker)| checker.check().err().map(|e| (name.clone(), e)))
            .collect()
    }
}

/// Check whose status is pushed from outside.
///
/// Reports failure only after `threshold` consecutive failed updates; a
/// single success clears it.
#[derive(Debug)]
pub struct StatusUpdater {
    threshold: u32,
    state: Mutex<UpdaterState>,
}

#[derive(Debug, Default)]
struct UpdaterState {
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl StatusUpdater {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: Mutex::new(UpdaterState::default()),
        }
    }

    pub fn update(&self, result: Result<(), String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                state.consecutive_failures = 0;
                state.last_error = None;
            }
            Err(e) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_error = Some(e);
            }
        }
    }
}

impl Checker for StatusUpdater {
    fn check(&self) -> Result<(), String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.last_error {
            Some(e) if state.consecutive_failures >= self.threshold => Err(e.clone()),
            _ => Ok(()),
        }
    }
}

/// Middleware function refusing traffic while any check fails.
pub async fn health_gate(
    State(registry): State<Arc<HealthRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let failures = registry.failures();
    if failures.is_empty() {
        return next.run(request).await;
    }

    tracing::warn!(failing = ?failures.keys().collect::<Vec<_>>(), "Health checks failing");
    (StatusCode::SERVICE_UNAVAILABLE, Json(failures)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    struct Fixed(Result<(), String>);

    impl Checker for Fixed {
        fn check(&self) -> Result<(), String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_updater_threshold() {
        let updater = StatusUpdater::new(2);
        assert!(updater.check().is_ok());

        updater.update(Err("connection refused".into()));
        assert!(updater.check().is_ok());

        updater.update(Err("connection refused".into()));
        assert_eq!(updater.check(), Err("connection refused".to_string()));

        updater.update(Ok(()));
        assert!(updater.check().is_ok());
    }

    #[test]
    fn test_registry_reports_only_failures() {
        let registry = HealthRegistry::new();
        registry.register("disk", Arc::new(Fixed(Ok(()))));
        registry.register("upstream", Arc::new(Fixed(Err("down".into()))));

        let failures = registry.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures["upstream"], "down");
    }

    #[tokio::test]
    async fn test_middleware_returns_503_json() {
        let registry = Arc::new(HealthRegistry::new());
        registry.register("upstream", Arc::new(Fixed(Err("timeout".into()))));

        let app = Router::new()
            .fallback(|| async { "downstream" })
            .layer(middleware::from_fn_with_state(registry, health_gate));

        let response = app
            .oneshot(Request::builder().uri("/v2/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "upstream": "timeout" }));
    }

    #[tokio::test]
    async fn test_middleware_transparent_when_healthy() {
        let registry = Arc::new(HealthRegistry::new());
        registry.register("upstream", Arc::new(Fixed(Ok(()))));

        let app = Router::new()
            .fallback(|| async { "downstream" })
            .layer(middleware::from_fn_with_state(registry, health_gate));

        let response = app
            .oneshot(Request::builder().uri("/v2/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

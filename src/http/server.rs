//! HTTP server setup and middleware composition.
//!
//! # Responsibilities
//! - Build the quota, health registry and upstream adapter from config
//! - Wrap the service in the fixed middleware order
//! - Bind server to listener and serve until shutdown
//! - Run the upstream probe alongside the server

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{uri::Authority, HeaderName, Request},
    middleware::from_fn_with_state,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::admission::{admission_gate, AdmissionGate, Quota};
use crate::config::GateConfig;
use crate::health::{health_gate, HealthRegistry, StatusUpdater, UpstreamProbe};
use crate::http::crash::{self, FatalHook};
use crate::http::liveness::liveness_bypass;
use crate::http::upstream::Upstream;
use crate::observability::metrics;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Error type for server startup and serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream address {address:?}: {source}")]
    Upstream {
        address: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the middleware chain needs, decided once at startup.
#[derive(Clone)]
pub struct Middleware {
    pub gate: Arc<AdmissionGate>,
    pub liveness_path: Arc<str>,
    pub health: Arc<HealthRegistry>,
    pub on_fatal: FatalHook,
}

impl Middleware {
    pub fn from_config(config: &GateConfig, quota: Arc<Quota>, on_fatal: FatalHook) -> Self {
        let gate = AdmissionGate::new(quota, &config.admission).exempt(config.liveness.path.clone());

        Self {
            gate: Arc::new(gate),
            liveness_path: Arc::from(config.liveness.path.as_str()),
            health: Arc::new(HealthRegistry::new()),
            on_fatal,
        }
    }
}

/// Wrap `service` in the middleware chain.
///
/// Outermost first: request id, request logging, crash containment,
/// admission gate, liveness bypass, health checks, then `service`.
pub fn compose(service: Router, middleware: Middleware) -> Router {
    let stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }).on_response(DefaultOnResponse::new().level(Level::INFO)))
        .layer(crash::layer(middleware.on_fatal))
        .layer(from_fn_with_state(middleware.gate, admission_gate))
        .layer(from_fn_with_state(middleware.liveness_path, liveness_bypass))
        .layer(from_fn_with_state(middleware.health, health_gate));

    service.layer(stack)
}

/// HTTP server for the admission gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    quota: Arc<Quota>,
    probe: Option<UpstreamProbe>,
}

impl HttpServer {
    /// Create a server whose handler panics terminate the process.
    pub fn new(config: GateConfig) -> Result<Self, ServerError> {
        Self::with_fatal_hook(config, crash::terminate())
    }

    /// Create a server with a custom escalation for handler panics.
    pub fn with_fatal_hook(config: GateConfig, on_fatal: FatalHook) -> Result<Self, ServerError> {
        let authority: Authority =
            config
                .upstream
                .address
                .parse()
                .map_err(|source| ServerError::Upstream {
                    address: config.upstream.address.clone(),
                    source,
                })?;

        let quota = Arc::new(Quota::new(config.admission.initial_quota));
        metrics::record_quota_limit(config.admission.initial_quota);
        let middleware = Middleware::from_config(&config, quota.clone(), on_fatal);

        let probe = if config.health_check.enabled {
            let status = Arc::new(StatusUpdater::new(config.health_check.unhealthy_threshold));
            middleware.health.register("upstream", status.clone());
            Some(UpstreamProbe::new(
                authority.clone(),
                config.health_check.clone(),
                status,
            ))
        } else {
            None
        };

        let service = Upstream::new(authority)
            .into_router(Duration::from_secs(config.upstream.request_timeout_secs));
        let router = compose(service, middleware);

        Ok(Self {
            router,
            config,
            quota,
            probe,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            control_path = %self.config.admission.control_path,
            liveness_path = %self.config.liveness.path,
            quota = self.quota.get(),
            "HTTP server starting"
        );

        if let Some(probe) = self.probe {
            let probe_shutdown = shutdown.resubscribe();
            tokio::spawn(probe.run(probe_shutdown));
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The quota shared with the admission gate.
    pub fn quota(&self) -> Arc<Quota> {
        self.quota.clone()
    }
}

async fn wait_for(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}

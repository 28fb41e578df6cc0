//! Active upstream probing.
//!
//! # Responsibilities
//! - Periodically GET the configured path on the upstream
//! - Feed each result into the `upstream` status check

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{uri::Authority, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::checks::StatusUpdater;

pub struct UpstreamProbe {
    upstream: Authority,
    config: HealthCheckConfig,
    status: Arc<StatusUpdater>,
    client: Client<HttpConnector, Body>,
}

impl UpstreamProbe {
    pub fn new(upstream: Authority, config: HealthCheckConfig, status: Arc<StatusUpdater>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            upstream,
            config,
            status,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            upstream = %self.upstream,
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Upstream probe starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.probe().await;
                    if let Err(e) = &result {
                        tracing::warn!(upstream = %self.upstream, error = %e, "Upstream probe failed");
                    }
                    self.status.update(result);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Upstream probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn probe(&self) -> Result<(), String> {
        let request = Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", self.upstream, self.config.path))
            .header("user-agent", "quota-gate-health-check")
            .body(Body::empty())
            .map_err(|e| format!("invalid probe request: {e}"))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("unexpected status {}", response.status())),
            Ok(Err(e)) => Err(format!("connection error: {e}")),
            Err(_) => Err(format!("no response within {}s", self.config.timeout_secs)),
        }
    }
}

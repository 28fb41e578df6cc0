//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{body::Body, http::Request, Router};
use quota_gate::config::GateConfig;
use quota_gate::http::{FatalHook, HttpServer, Middleware};
use quota_gate::{Quota, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock upstream answering every request with `200` and `body`.
///
/// Returns its address and a counter of accepted connections.
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

/// Start a mock upstream that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Stub downstream service counting the requests that reach it.
pub fn stub_service(hits: Arc<AtomicUsize>) -> Router {
    Router::new().fallback(move |request: Request<Body>| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            if request.uri().path() == "/panic" {
                panic!("stub downstream exploded");
            }
            "downstream"
        }
    })
}

/// Fatal hook recording panic messages instead of exiting.
pub fn recording_hook() -> (FatalHook, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let hook: FatalHook = Arc::new(move |message: &str| {
        recorder.lock().unwrap().push(message.to_string());
    });
    (hook, seen)
}

/// Composed chain around a counting stub, with default config.
pub struct StubChain {
    pub router: Router,
    pub quota: Arc<Quota>,
    pub hits: Arc<AtomicUsize>,
    pub fatal: Arc<Mutex<Vec<String>>>,
    pub middleware: Middleware,
}

pub fn stub_chain() -> StubChain {
    let config = GateConfig::default();
    let quota = Arc::new(Quota::new(config.admission.initial_quota));
    let hits = Arc::new(AtomicUsize::new(0));
    let (hook, fatal) = recording_hook();
    let middleware = Middleware::from_config(&config, quota.clone(), hook);
    let router = quota_gate::http::compose(stub_service(hits.clone()), middleware.clone());

    StubChain {
        router,
        quota,
        hits,
        fatal,
        middleware,
    }
}

/// Config pointing at `upstream` with the probe disabled.
pub fn config_for(upstream: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.address = upstream.to_string();
    config.health_check.enabled = false;
    config
}

/// Serve `config` on an ephemeral port. Returns the address, the quota and
/// the shutdown coordinator.
pub async fn start_gate(config: GateConfig) -> (SocketAddr, Arc<Quota>, Shutdown) {
    let (hook, _) = recording_hook();
    let server = HttpServer::with_fatal_hook(config, hook).unwrap();
    let quota = server.quota();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, quota, shutdown)
}

/// HTTP client that does not follow the control page redirect.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

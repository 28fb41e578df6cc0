//! Quota-gated front door for a network service.
//!
//! Wraps an upstream service in a fixed middleware chain: request logging,
//! crash containment, a runtime-adjustable request quota with a small control
//! page, a liveness bypass and health checks.

pub mod admission;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use admission::Quota;
pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

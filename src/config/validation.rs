//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and the relations
//! between sections. All failures are collected, not just the first.

use std::net::SocketAddr;

use axum::http::uri::Authority;

use crate::config::schema::GateConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("upstream.address {0:?} is not a valid authority")]
    UpstreamAddress(String),

    #[error("upstream.request_timeout_secs must be greater than zero")]
    UpstreamTimeout,

    #[error("{field} {path:?} must start with '/'")]
    RelativePath { field: &'static str, path: String },

    #[error("admission.control_path and liveness.path are both {0:?}")]
    PathCollision(String),

    #[error("admission.form_field must not be empty")]
    EmptyFormField,

    #[error("admission.retry_after_secs must be greater than zero")]
    RetryAfter,

    #[error("health_check.{0} must be greater than zero")]
    HealthCheck(&'static str),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::UpstreamAddress(config.upstream.address.clone()));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::UpstreamTimeout);
    }

    let admission = &config.admission;
    for (field, path) in [
        ("admission.control_path", &admission.control_path),
        ("liveness.path", &config.liveness.path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                path: path.clone(),
            });
        }
    }
    if admission.control_path == config.liveness.path {
        errors.push(ValidationError::PathCollision(admission.control_path.clone()));
    }
    if admission.form_field.is_empty() {
        errors.push(ValidationError::EmptyFormField);
    }
    if admission.retry_after_secs == 0 {
        errors.push(ValidationError::RetryAfter);
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::HealthCheck("interval_secs"));
        }
        if health.timeout_secs == 0 {
            errors.push(ValidationError::HealthCheck("timeout_secs"));
        }
        if health.unhealthy_threshold == 0 {
            errors.push(ValidationError::HealthCheck("unhealthy_threshold"));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

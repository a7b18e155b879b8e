//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check cross-field requirements (http binding needs an upstream)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{BindingKind, GatewayConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("mirror.upstream is required when mirror.binding = \"http\"")]
    MissingUpstream,

    #[error("mirror.upstream: '{0}' is not a valid authority")]
    InvalidUpstream(String),

    #[error("rates.watch requires rates.path")]
    WatchWithoutPath,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::MustBePositive { field: "timeouts.request_secs" });
    }

    if config.rates.watch && config.rates.path.is_none() {
        errors.push(ValidationError::WatchWithoutPath);
    }

    let mirror = &config.mirror;
    if mirror.capture_limit_bytes == 0 {
        errors.push(ValidationError::MustBePositive { field: "mirror.capture_limit_bytes" });
    }
    if mirror.timeout_secs == 0 {
        errors.push(ValidationError::MustBePositive { field: "mirror.timeout_secs" });
    }
    if mirror.binding == BindingKind::Http {
        match &mirror.upstream {
            None => errors.push(ValidationError::MissingUpstream),
            Some(upstream) if upstream.parse::<Authority>().is_err() => {
                errors.push(ValidationError::InvalidUpstream(upstream.clone()));
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

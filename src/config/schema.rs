//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Exchange-rate table source.
    pub rates: RatesConfig,

    /// Request/response mirroring.
    pub mirror: MirrorSettings,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for the primary request path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Where the exchange-rate table comes from.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RatesConfig {
    /// CSV file to load instead of the embedded table.
    pub path: Option<String>,

    /// Reload the table when the file changes.
    pub watch: bool,
}

/// Which downstream binding receives mirrored traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// No binding; every mirror attempt logs a missing-binding error.
    None,
    /// In-process structured call that records envelopes as log events.
    #[default]
    Log,
    /// Generic fetch to an HTTP upstream.
    Http,
}

/// Mirroring settings that are fixed for the process lifetime.
///
/// The per-request options (`IGNORE_CACHED_RESPONSES`, `MAX_BODY_SIZE_BYTES`)
/// come from the environment instead; see [`crate::mirror::MirrorConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Binding shape to construct at startup.
    pub binding: BindingKind,

    /// Upstream authority (e.g., "127.0.0.1:9100") for the `http` binding.
    pub upstream: Option<String>,

    /// Hard ceiling on bytes kept per body copy; larger copies are dropped.
    pub capture_limit_bytes: usize,

    /// Timeout for a single outbound mirror call, in seconds.
    pub timeout_secs: u64,

    /// How long shutdown waits for in-flight mirror calls, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            binding: BindingKind::Log,
            upstream: None,
            capture_limit_bytes: 16 * 1024 * 1024, // 16MB
            timeout_secs: 10,
            drain_timeout_secs: 5,
        }
    }
}

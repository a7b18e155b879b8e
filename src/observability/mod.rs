//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to the HTTP span and carried
//!   into mirrored envelopes through the request headers
//! - Mirroring outcomes are counted, never surfaced to clients

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;

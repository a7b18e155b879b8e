//! Request/response mirroring subsystem.
//!
//! Every exchange handled by the API is copied to a downstream service
//! without touching the latency or content of the client's response.
//!
//! # Data Flow
//! ```text
//! layer.rs       websocket bypass, orchestration
//!   → capture.rs     request head + body tee, primary handler, response head + body tee
//!   → cache_filter.rs  skip cached responses when configured
//!   → envelope.rs    normalized record, bodies gated by size_gate.rs
//!   → adapter.rs     structured call or generic fetch (binding.rs)
//!   → dispatch.rs    tracked background task, failures logged
//! ```
//!
//! # Design Decisions
//! - Per-request options come from an environment snapshot handed to
//!   [`MirrorService::new`], see [`config`]
//! - The binding shape is probed once at construction
//! - No mirroring error crosses the middleware boundary

pub mod adapter;
pub mod binding;
pub mod cache_filter;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod layer;
pub mod sinks;
pub mod size_gate;

pub use adapter::{build_fetch_request, FetchPayload, BODY_MARKER, MIRROR_ENDPOINT};
pub use binding::{BindingError, GenericFetch, MirrorError, MirrorTarget, ServiceBinding, StructuredCall};
pub use cache_filter::{should_suppress, CACHE_STATUS_HEADER};
pub use capture::{CaptureError, CaptureLimits, CapturedBody, RequestCapture, ResponseCapture};
pub use config::MirrorConfig;
pub use dispatch::BackgroundTasks;
pub use envelope::{ConnectionMetadata, Envelope, HeaderBag};
pub use layer::{mirror_middleware, MirrorService};
pub use sinks::{binding_from_settings, HttpFetch, TracingSink};
pub use size_gate::should_send_body;

//! Mirroring middleware.
//!
//! # Responsibilities
//! - Skip websocket upgrades entirely
//! - Snapshot the request before the primary handler runs and the response
//!   after it returns
//! - Apply the cache filter and size gate, then hand the envelope to the
//!   background dispatcher
//!
//! # Data Flow
//! ```text
//! request ─► bypass? ─► tee request ─► next.run ─► cache filter ─► tee response ─► client
//!                                                                       │
//!                       (bodies settle as the client side reads them)   ▼
//!            BackgroundTasks::spawn ─► envelope (size gate ×2) ─► binding
//! ```
//!
//! The response returned to the client is the one `next.run` produced. Its
//! head is returned as soon as the handler has one; the body copy completes
//! off the response path. Nothing on the mirror path changes the status,
//! headers, or body.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::{EnvVars, MirrorSettings};
use crate::mirror::binding::{BindingError, MirrorTarget, ServiceBinding};
use crate::mirror::cache_filter::should_suppress;
use crate::mirror::capture::{capture_request, capture_response, CaptureLimits, RequestCapture, ResponseCapture};
use crate::mirror::config::MirrorConfig;
use crate::mirror::dispatch::{deliver, BackgroundTasks};
use crate::mirror::envelope::Envelope;
use crate::observability::metrics;

/// Shared state of the mirroring subsystem.
#[derive(Clone)]
pub struct MirrorService {
    inner: Arc<Inner>,
}

struct Inner {
    env: EnvVars,
    target: Result<MirrorTarget, BindingError>,
    capture_ceiling: usize,
    tasks: BackgroundTasks,
}

impl MirrorService {
    /// Build the subsystem, probing `binding` once.
    ///
    /// A missing or unusable binding is not fatal; it is reported on every
    /// request that would have been mirrored.
    pub fn new(settings: &MirrorSettings, env: EnvVars, binding: Option<ServiceBinding>) -> Self {
        let target = MirrorTarget::probe(binding.as_ref());
        match &target {
            Ok(target) => tracing::info!(target_kind = target.kind(), "Mirror binding resolved"),
            Err(e) => tracing::warn!(error = %e, "Mirror binding unusable, requests will not be mirrored"),
        }

        Self {
            inner: Arc::new(Inner {
                env,
                target,
                capture_ceiling: settings.capture_limit_bytes,
                tasks: BackgroundTasks::new(),
            }),
        }
    }

    /// Deliveries started by this service.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    /// Per-request configuration from the environment snapshot.
    pub fn resolve_config(&self) -> MirrorConfig {
        MirrorConfig::resolve(&self.inner.env)
    }

    fn limits(&self, config: &MirrorConfig) -> CaptureLimits {
        CaptureLimits {
            max_body_size_bytes: config.max_body_size_bytes,
            ceiling: self.inner.capture_ceiling,
        }
    }

    /// Settle both body copies in the background, then gate and deliver.
    fn dispatch(&self, target: MirrorTarget, config: MirrorConfig, request: RequestCapture, response: ResponseCapture) {
        self.inner.tasks.spawn(async move {
            let url = request.url.clone();
            let (request, response) = match tokio::join!(request.settle(), response.settle()) {
                (Ok(request), Ok(response)) => (request, response),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, url = %url, "Failed to capture exchange for mirroring");
                    metrics::record_mirror_skipped("capture");
                    return;
                }
            };

            let envelope = Envelope::assemble(request, response, &config);
            deliver(target.kind(), target.dispatch(envelope)).await;
        });
    }
}

fn suppressed(config: &MirrorConfig, response: &Response, uri: &Uri) -> bool {
    if !should_suppress(config, response.headers()) {
        return false;
    }
    tracing::debug!(uri = %uri, "Cached response, mirroring suppressed");
    metrics::record_mirror_skipped("cache_hit");
    true
}

impl std::fmt::Debug for MirrorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorService")
            .field("target", &self.inner.target)
            .field("capture_ceiling", &self.inner.capture_ceiling)
            .field("in_flight", &self.inner.tasks.in_flight())
            .finish()
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

/// Mirror every request/response pair passing through.
pub async fn mirror_middleware(State(mirror): State<MirrorService>, request: Request, next: Next) -> Response {
    if is_websocket_upgrade(request.headers()) {
        return next.run(request).await;
    }

    let config = mirror.resolve_config();
    let uri = request.uri().clone();

    let target = match &mirror.inner.target {
        Ok(target) => target.clone(),
        Err(e) => {
            // nothing to capture for, the cache filter still runs first
            let response = next.run(request).await;
            if !suppressed(&config, &response, &uri) {
                tracing::error!(error = %e, uri = %uri, "Cannot mirror request");
                metrics::record_mirror_skipped("binding");
            }
            return response;
        }
    };

    let limits = mirror.limits(&config);
    let (request, request_capture) = capture_request(request, limits);
    let response = next.run(request).await;

    if suppressed(&config, &response, &uri) {
        return response;
    }

    let (response, response_capture) = capture_response(response, limits);
    mirror.dispatch(target, config, request_capture, response_capture);
    response
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics, mirroring)
//! - Serve until shutdown, then drain mirror deliveries
//! - Keep the rate file watcher alive while serving
//!
//! # Middleware order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → Timeout → metrics
//!     → mirror → method guard → routes
//! ```
//! The request ID is assigned before mirroring so it travels with the
//! mirrored request headers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::Request,
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{EnvVars, GatewayConfig};
use crate::error::GatewayError;
use crate::http::routes::{self, AppState};
use crate::lifecycle::ShutdownListener;
use crate::mirror::{binding_from_settings, mirror_middleware, MirrorService, ServiceBinding};
use crate::observability::metrics;
use crate::rates::{RateService, RatesWatcher};

pub const X_REQUEST_ID: &str = "x-request-id";

/// HTTP server for the currency API.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    rates: Arc<RateService>,
    mirror: MirrorService,
}

impl HttpServer {
    /// Build the server with the binding described by `config.mirror`.
    pub fn new(config: GatewayConfig, env: EnvVars) -> Result<Self, GatewayError> {
        let binding = binding_from_settings(&config.mirror)?;
        Ok(Self::with_binding(config, env, binding))
    }

    /// Build the server around an explicit mirror binding.
    pub fn with_binding(config: GatewayConfig, env: EnvVars, binding: Option<ServiceBinding>) -> Self {
        let rates = Arc::new(RateService::from_config(&config.rates));
        let mirror = MirrorService::new(&config.mirror, env, binding);
        Self::with_parts(config, rates, mirror)
    }

    /// Build the server around already constructed subsystems.
    pub fn with_parts(config: GatewayConfig, rates: Arc<RateService>, mirror: MirrorService) -> Self {
        let state = AppState { rates: rates.clone() };
        let router = Self::build_router(&config, state, mirror.clone());
        Self {
            router,
            config,
            rates,
            mirror,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, mirror: MirrorService) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/", get(routes::root))
            .route("/hello", get(routes::hello))
            .route("/health", get(routes::health))
            .route("/convert", get(routes::convert))
            .route("/currencies", get(routes::currencies))
            .fallback(routes::not_found)
            .with_state(state)
            .layer(middleware::from_fn(routes::method_guard))
            .layer(middleware::from_fn_with_state(mirror, mirror_middleware))
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
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
            }))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    /// Router with all layers, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn mirror(&self) -> &MirrorService {
        &self.mirror
    }

    pub fn rates(&self) -> &Arc<RateService> {
        &self.rates
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain mirror deliveries.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let _watcher = self.start_rates_watcher();

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.triggered().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");

        let drain = Duration::from_secs(self.config.mirror.drain_timeout_secs);
        if self.mirror.tasks().drain(drain).await {
            tracing::info!("Mirror deliveries drained");
        }

        Ok(())
    }

    fn start_rates_watcher(&self) -> Option<notify::RecommendedWatcher> {
        if !self.config.rates.watch {
            return None;
        }
        let path = self.rates.source().path()?;

        match RatesWatcher::new(path, self.rates.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to watch rate file");
                None
            }
        }
    }
}

/// Count and time every request.
async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

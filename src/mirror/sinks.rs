//! Bindings shipped with the gateway.
//!
//! # Bindings
//! - `TracingSink`: structured call recording each envelope as a log event
//! - `HttpFetch`: generic fetch that sends the well-known mirror request to a
//!   configured upstream

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{BindingKind, MirrorSettings};
use crate::mirror::binding::{GenericFetch, MirrorError, ServiceBinding, StructuredCall};
use crate::mirror::envelope::{ConnectionMetadata, HeaderBag};

/// Records envelopes as `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

#[async_trait]
impl StructuredCall for TracingSink {
    async fn handle_worker_request(
        &self,
        request_timestamp: u64,
        connection_metadata: ConnectionMetadata,
        method: String,
        url: String,
        request_headers: HeaderBag,
        request_body: Option<Bytes>,
        response_timestamp: u64,
        response_headers: HeaderBag,
        status: u16,
        response_body: Option<Bytes>,
    ) -> Result<(), MirrorError> {
        tracing::info!(
            target: "fx_gateway::mirror",
            request_timestamp,
            response_timestamp,
            elapsed_ms = response_timestamp.saturating_sub(request_timestamp),
            method = %method,
            url = %url,
            status,
            request_id = request_headers.get("x-request-id").map(String::as_str).unwrap_or("unknown"),
            request_headers = request_headers.len(),
            response_headers = response_headers.len(),
            request_body_bytes = request_body.as_ref().map(|b| b.len()),
            response_body_bytes = response_body.as_ref().map(|b| b.len()),
            connection = %serde_json::Value::Object(connection_metadata.0),
            "Mirrored request"
        );
        Ok(())
    }
}

/// Sends mirror requests to an HTTP upstream.
#[derive(Clone)]
pub struct HttpFetch {
    client: Client<HttpConnector, Body>,
    upstream: Authority,
    timeout: Duration,
}

impl HttpFetch {
    pub fn new(upstream: Authority, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            upstream,
            timeout,
        }
    }

    /// Point the request at the upstream, keeping path and query.
    fn rewrite(&self, uri: &Uri) -> Result<Uri, MirrorError> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.upstream.clone());
        Uri::from_parts(parts).map_err(|e| MirrorError::Call(e.to_string()))
    }
}

#[async_trait]
impl GenericFetch for HttpFetch {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, MirrorError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.rewrite(&parts.uri)?;
        let request = Request::from_parts(parts, body);

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let (parts, body): (_, hyper::body::Incoming) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => Err(MirrorError::Transport(e.to_string())),
            Err(_) => Err(MirrorError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Build the binding described by `settings`.
///
/// `BindingKind::None` yields no binding at all.
pub fn binding_from_settings(settings: &MirrorSettings) -> Result<Option<ServiceBinding>, MirrorError> {
    match settings.binding {
        BindingKind::None => Ok(None),
        BindingKind::Log => Ok(Some(ServiceBinding::new().with_structured_call(Arc::new(TracingSink)))),
        BindingKind::Http => {
            let upstream = settings
                .upstream
                .as_deref()
                .ok_or_else(|| MirrorError::Call("mirror.upstream is not set".into()))?;
            let authority =
                Authority::from_str(upstream).map_err(|e| MirrorError::Call(e.to_string()))?;
            let fetch = HttpFetch::new(authority, Duration::from_secs(settings.timeout_secs));
            Ok(Some(ServiceBinding::new().with_generic_fetch(Arc::new(fetch))))
        }
    }
}

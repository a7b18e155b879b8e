//! Downstream mirror service contracts.
//!
//! A binding may expose a structured call, a generic fetch, both, or neither.
//! [`MirrorTarget::probe`] picks the variant once when the mirroring subsystem
//! is built; dispatch code never inspects the binding again.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use thiserror::Error;

use crate::mirror::envelope::{ConnectionMetadata, HeaderBag};

/// Errors raised while delivering a mirror envelope.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to encode mirror payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to build mirror request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("mirror transport error: {0}")]
    Transport(String),

    #[error("mirror call timed out after {0} seconds")]
    Timeout(u64),

    #[error("mirror endpoint responded with status {0}")]
    Rejected(StatusCode),

    #[error("mirror call failed: {0}")]
    Call(String),
}

/// A binding that cannot be used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("service binding for the mirror is missing")]
    Missing,

    #[error("service binding for the mirror has neither a structured call nor a fetch capability")]
    UnsupportedShape,
}

/// Direct call taking the envelope fields in their fixed order.
#[async_trait]
pub trait StructuredCall: Send + Sync {
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<(), MirrorError>;
}

/// Executes an arbitrary outbound request.
#[async_trait]
pub trait GenericFetch: Send + Sync {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, MirrorError>;
}

/// The set of capabilities a downstream binding exposes.
#[derive(Clone, Default)]
pub struct ServiceBinding {
    structured: Option<Arc<dyn StructuredCall>>,
    fetch: Option<Arc<dyn GenericFetch>>,
}

impl ServiceBinding {
    /// A binding with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_structured_call(mut self, call: Arc<dyn StructuredCall>) -> Self {
        self.structured = Some(call);
        self
    }

    pub fn with_generic_fetch(mut self, fetch: Arc<dyn GenericFetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn structured_call(&self) -> Option<&Arc<dyn StructuredCall>> {
        self.structured.as_ref()
    }

    pub fn generic_fetch(&self) -> Option<&Arc<dyn GenericFetch>> {
        self.fetch.as_ref()
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("structured_call", &self.structured.is_some())
            .field("generic_fetch", &self.fetch.is_some())
            .finish()
    }
}

/// The capability chosen for dispatch.
#[derive(Clone)]
pub enum MirrorTarget {
    Structured(Arc<dyn StructuredCall>),
    Fetch(Arc<dyn GenericFetch>),
}

impl MirrorTarget {
    /// Resolve the dispatch variant, preferring the structured call.
    pub fn probe(binding: Option<&ServiceBinding>) -> Result<Self, BindingError> {
        let binding = binding.ok_or(BindingError::Missing)?;

        if let Some(call) = binding.structured_call() {
            return Ok(MirrorTarget::Structured(call.clone()));
        }
        if let Some(fetch) = binding.generic_fetch() {
            return Ok(MirrorTarget::Fetch(fetch.clone()));
        }
        Err(BindingError::UnsupportedShape)
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorTarget::Structured(_) => "structured",
            MirrorTarget::Fetch(_) => "fetch",
        }
    }
}

impl fmt::Debug for MirrorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MirrorTarget::{}", self.kind())
    }
}

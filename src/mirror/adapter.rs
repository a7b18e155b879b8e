//! Delivery of an envelope through the resolved capability.
//!
//! # Wire shapes
//! - Structured call: the ten envelope fields in order, absent bodies as `None`
//! - Generic fetch: `POST` to [`MIRROR_ENDPOINT`] with a JSON document holding
//!   the same ten fields; both body fields always carry [`BODY_MARKER`] so the
//!   receiver sees every field. Headers are `content-type: application/json`
//!   with the original request headers applied on top (framing headers
//!   excluded, they describe the original body and not this one)

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use serde::Serialize;

use crate::mirror::binding::{MirrorError, MirrorTarget};
use crate::mirror::envelope::{ConnectionMetadata, Envelope, HeaderBag};

/// Well-known address the generic fetch shape posts to.
pub const MIRROR_ENDPOINT: &str = "http://mirror.internal/v1/requests";

/// Placeholder sent in place of body streams in the JSON shape.
pub const BODY_MARKER: &str = "stream";

const SKIPPED_HEADERS: [HeaderName; 3] = [header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::HOST];

/// JSON document sent by the generic fetch shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPayload<'a> {
    pub request_timestamp: u64,
    pub connection_metadata: &'a ConnectionMetadata,
    pub method: &'a str,
    pub url: &'a str,
    pub request_headers: &'a HeaderBag,
    pub request_body: &'static str,
    pub response_timestamp: u64,
    pub response_headers: &'a HeaderBag,
    pub status: u16,
    pub response_body: &'static str,
}

impl<'a> From<&'a Envelope> for FetchPayload<'a> {
    fn from(envelope: &'a Envelope) -> Self {
        Self {
            request_timestamp: envelope.request_timestamp,
            connection_metadata: &envelope.connection_metadata,
            method: &envelope.method,
            url: &envelope.url,
            request_headers: &envelope.request_headers,
            request_body: BODY_MARKER,
            response_timestamp: envelope.response_timestamp,
            response_headers: &envelope.response_headers,
            status: envelope.status,
            response_body: BODY_MARKER,
        }
    }
}

/// Build the outbound request for the generic fetch shape.
pub fn build_fetch_request(envelope: &Envelope) -> Result<Request<Body>, MirrorError> {
    let payload = serde_json::to_vec(&FetchPayload::from(envelope))?;

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(MIRROR_ENDPOINT)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in &envelope.request_headers {
            let Ok(name) = HeaderName::try_from(name.as_str()) else { continue };
            if SKIPPED_HEADERS.contains(&name) {
                continue;
            }
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }
    }

    Ok(builder.body(Body::from(payload))?)
}

impl MirrorTarget {
    /// Deliver one envelope.
    ///
    /// A fetch answered with status 400 or above is reported as
    /// [`MirrorError::Rejected`].
    pub async fn dispatch(&self, envelope: Envelope) -> Result<(), MirrorError> {
        match self {
            MirrorTarget::Structured(call) => {
                call.handle_worker_request(
                    envelope.request_timestamp,
                    envelope.connection_metadata,
                    envelope.method,
                    envelope.url,
                    envelope.request_headers,
                    envelope.request_body,
                    envelope.response_timestamp,
                    envelope.response_headers,
                    envelope.status,
                    envelope.response_body,
                )
                .await
            }
            MirrorTarget::Fetch(fetch) => {
                let request = build_fetch_request(&envelope)?;
                let response = fetch.fetch(request).await?;
                let status = response.status();
                if status.as_u16() >= 400 {
                    return Err(MirrorError::Rejected(status));
                }
                Ok(())
            }
        }
    }
}

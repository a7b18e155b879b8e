//! The unit of data handed to the mirror service.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mirror::capture::{RequestSnapshot, ResponseSnapshot};
use crate::mirror::config::MirrorConfig;
use crate::mirror::size_gate::should_send_body;

/// Headers flattened to lowercase names in sorted order.
///
/// Repeated headers are joined with `", "`.
pub type HeaderBag = BTreeMap<String, String>;

/// Collapse a header map into a [`HeaderBag`].
pub fn collapse_headers(headers: &HeaderMap) -> HeaderBag {
    let mut bag = HeaderBag::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        bag.entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    bag
}

/// Opaque key-value description of the connection a request arrived on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionMetadata(pub Map<String, Value>);

impl ConnectionMetadata {
    /// Metadata for a request.
    ///
    /// An explicit `ConnectionMetadata` extension (set by an outer layer) takes
    /// precedence; otherwise the peer address is recorded when the server was
    /// started with connect info. Falls back to an empty object.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        if let Some(metadata) = request.extensions().get::<ConnectionMetadata>() {
            return metadata.clone();
        }

        let mut map = Map::new();
        if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
            map.insert("clientAddress".into(), Value::String(addr.ip().to_string()));
            map.insert("clientPort".into(), Value::from(addr.port()));
            map.insert("httpProtocol".into(), Value::String(format!("{:?}", request.version())));
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Absolute URL of a request as seen by the client.
pub(crate) fn absolute_url<B>(request: &Request<B>) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let headers = request.headers();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    format!("{}://{}{}", scheme, host, path)
}

/// Request and response data for one mirrored exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Milliseconds since the Unix epoch when the request was cloned.
    pub request_timestamp: u64,
    pub connection_metadata: ConnectionMetadata,
    pub method: String,
    pub url: String,
    pub request_headers: HeaderBag,
    /// Present only when the size gate admitted it.
    pub request_body: Option<Bytes>,
    /// Milliseconds since the Unix epoch when the response was cloned.
    pub response_timestamp: u64,
    pub response_headers: HeaderBag,
    pub status: u16,
    /// Present only when the size gate admitted it.
    pub response_body: Option<Bytes>,
}

impl Envelope {
    /// Combine both snapshots, gating each body against `config`.
    pub fn assemble(request: RequestSnapshot, response: ResponseSnapshot, config: &MirrorConfig) -> Self {
        let send_request_body =
            should_send_body(request.body.presence(), &request.headers, config.max_body_size_bytes);
        let send_response_body =
            should_send_body(response.body.presence(), &response.headers, config.max_body_size_bytes);

        Self {
            request_timestamp: request.timestamp,
            connection_metadata: request.connection,
            method: request.method.to_string(),
            url: request.url,
            request_headers: collapse_headers(&request.headers),
            request_body: send_request_body.then(|| request.body.bytes()).flatten(),
            response_timestamp: response.timestamp,
            response_headers: collapse_headers(&response.headers),
            status: response.status.as_u16(),
            response_body: send_response_body.then(|| response.body.bytes()).flatten(),
        }
    }
}

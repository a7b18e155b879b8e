//! JSON response formatting.
//!
//! Every JSON body is pretty-printed and carries the CORS headers the API
//! advertises for browser clients.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Current time as ISO-8601 UTC with millisecond precision.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    response
}

/// Pretty-printed JSON with CORS headers.
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response {
    let body = match serde_json::to_vec_pretty(data) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            return with_cors(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response)
}

/// Empty 200 answering a CORS preflight.
pub fn preflight() -> Response {
    with_cors(StatusCode::OK.into_response())
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub message: &'a str,
    pub timestamp: String,
}

/// Timestamped error document.
pub fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    json_response(
        status,
        &ErrorBody {
            error,
            message,
            timestamp: iso_timestamp(),
        },
    )
}

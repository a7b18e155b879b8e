//! Body inclusion check.
//!
//! Only the declared `content-length` is consulted. A body without the header,
//! or with a lying one, is still attached regardless of its real size; reading
//! the stream to measure it would defeat the purpose of the check.

use axum::http::{header, HeaderMap};

/// Decide whether a body should be attached to a mirror envelope.
pub fn should_send_body<B>(body: Option<B>, headers: &HeaderMap, max_bytes: u64) -> bool {
    if body.is_none() {
        return false;
    }

    match declared_length(headers) {
        Some(length) if length > max_bytes as f64 => {
            tracing::debug!(
                content_length = length,
                max_bytes,
                "Content-Length exceeds mirror limit, not sending body"
            );
            false
        }
        _ => true,
    }
}

/// Numeric value of the `content-length` header, if it parses.
pub(crate) fn declared_length(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| !n.is_nan())
}

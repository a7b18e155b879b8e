//! Cache-hit suppression.

use axum::http::HeaderMap;

use crate::mirror::config::MirrorConfig;

/// Header carrying the edge cache outcome.
pub const CACHE_STATUS_HEADER: &str = "cf-cache-status";

/// Returns true when the response was served from cache and the
/// configuration asks for cached responses to be ignored.
pub fn should_suppress(config: &MirrorConfig, response_headers: &HeaderMap) -> bool {
    if !config.ignore_cached_responses {
        return false;
    }

    response_headers
        .get(CACHE_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("hit"))
        .unwrap_or(false)
}

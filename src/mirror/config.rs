//! Per-request mirroring options resolved from the environment.

use crate::config::EnvVars;

/// Environment variable toggling cache-hit suppression.
pub const IGNORE_CACHED_RESPONSES: &str = "IGNORE_CACHED_RESPONSES";

/// Environment variable holding the body size ceiling.
pub const MAX_BODY_SIZE_BYTES: &str = "MAX_BODY_SIZE_BYTES";

/// Body ceiling used when `MAX_BODY_SIZE_BYTES` is absent or invalid (1MB).
pub const DEFAULT_MAX_BODY_SIZE_BYTES: u64 = 1_048_576;

/// Options that shape a single mirror attempt.
///
/// `max_body_size_bytes` is always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Skip mirroring when the response was a cache hit.
    pub ignore_cached_responses: bool,
    /// Largest declared body length that is still attached to an envelope.
    pub max_body_size_bytes: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            ignore_cached_responses: false,
            max_body_size_bytes: DEFAULT_MAX_BODY_SIZE_BYTES,
        }
    }
}

impl MirrorConfig {
    /// Resolve the options from an environment snapshot.
    ///
    /// Invalid values silently fall back to the defaults.
    pub fn resolve(env: &EnvVars) -> Self {
        let ignore_cached_responses = env
            .get(IGNORE_CACHED_RESPONSES)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_body_size_bytes = env
            .get(MAX_BODY_SIZE_BYTES)
            .and_then(parse_int_prefix)
            .filter(|n| *n > 0)
            .map(|n| u64::try_from(n).unwrap_or(u64::MAX))
            .unwrap_or(DEFAULT_MAX_BODY_SIZE_BYTES);

        Self {
            ignore_cached_responses,
            max_body_size_bytes,
        }
    }
}

/// Parse the leading base-10 integer of `value`.
///
/// Leading whitespace and a single sign are accepted, parsing stops at the
/// first non-digit, and `None` means no digit was found. `"2048abc"` is 2048.
fn parse_int_prefix(value: &str) -> Option<i128> {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut seen = false;
    let mut n: i128 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        n = n.saturating_mul(10).saturating_add(i128::from(b - b'0'));
    }

    seen.then_some(if negative { -n } else { n })
}

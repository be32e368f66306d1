//! Environment helpers
//!
//! Typed reads of optional environment overrides. Unset, empty or
//! unparsable values are treated as absent.

use std::str::FromStr;

use tracing::warn;

/// Read a non-empty environment variable.
pub fn var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable; logs and ignores values that fail to parse.
pub fn var_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = var_non_empty(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(%key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// `LOG_FORMAT=json` switches the subscriber to structured JSON output.
pub fn wants_json_logs() -> bool {
    var_non_empty("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

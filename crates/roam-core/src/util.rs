//! Small helpers shared by config, auth and the REST adapters.

/// Trimmed text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Response bodies quoted in errors are cut to 180 characters.
pub fn compact_text(value: &str) -> String {
    const LIMIT: usize = 180;
    value.trim().chars().take(LIMIT).collect()
}

/// Seconds since the Unix epoch, used for session expiry.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

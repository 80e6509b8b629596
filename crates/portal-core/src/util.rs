//! Shared utility functions used across multiple modules.

use chrono::{TimeZone, Utc};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Human label for when an item was created, relative to `now_ms`.
pub fn format_created(created_at_ms: i64, now_ms: i64) -> String {
    let elapsed = now_ms.saturating_sub(created_at_ms);
    if elapsed < HOUR_MS {
        return "Just now".to_string();
    }
    if elapsed < 24 * HOUR_MS {
        return format!("{} hours ago", elapsed / HOUR_MS);
    }
    if elapsed < 48 * HOUR_MS {
        return "Yesterday".to_string();
    }

    Utc.timestamp_millis_opt(created_at_ms)
        .single()
        .map_or_else(String::new, |date| date.format("%Y-%m-%d").to_string())
}

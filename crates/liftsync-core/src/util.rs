//! Shared utility functions used across multiple modules.

use chrono::NaiveDate;

/// Storage format for date-only columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

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
    chrono::Utc::now().timestamp_millis()
}

/// Today's date in UTC, without a time component.
pub fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Render a date as the `YYYY-MM-DD` text stored in date-only columns.
///
/// Date-only columns must always be compared against values produced here,
/// never against a full timestamp string, or rows dated "today" fall out of
/// `>=` comparisons.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date-only value.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

//! Relative-time normalization for marketplace upload timestamps.
//!
//! The target sites render upload times as Korean relative text ("3시간 전").
//! Listings store the derived absolute timestamp so downstream analytics can
//! sort and bucket without re-deriving against an unknown crawl time.

use chrono::{DateTime, Duration, Local};
use regex::Regex;

/// Timestamp format used for normalized upload times.
pub const UPLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse Korean relative-time text ("N초|분|시간|일 전") into an absolute
/// timestamp string, anchored at the current local time.
///
/// Returns `None` when the text does not match the relative form; callers
/// substitute their documented default.
pub fn parse_relative_time(text: &str) -> Option<String> {
    parse_relative_time_at(text, Local::now())
}

/// Like [`parse_relative_time`], anchored at an explicit time.
pub fn parse_relative_time_at(text: &str, now: DateTime<Local>) -> Option<String> {
    let pattern = Regex::new(r"^(\d+)(초|분|시간|일) 전").ok()?;
    let captures = pattern.captures(text.trim())?;

    let value: i64 = captures.get(1)?.as_str().parse().ok()?;
    let delta = match captures.get(2)?.as_str() {
        "초" => Duration::seconds(value),
        "분" => Duration::minutes(value),
        "시간" => Duration::hours(value),
        "일" => Duration::days(value),
        _ => return None,
    };

    Some((now - delta).format(UPLOAD_TIME_FORMAT).to_string())
}

/// Timestamp fragment for run-summary filenames.
pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

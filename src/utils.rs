//! Utility functions for failure handling, date handling, string manipulation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - The fail-open wrapper every adapter, the resolver and the extractor go through
//! - ISO-8601 parsing for chronological ordering and date display
//! - String truncation and whitespace collapsing for logs and scraped text
//! - File system validation for the seen store location

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Unwrap a fallible step or log it and substitute a fallback.
///
/// Fetching, parsing and extraction never abort the pipeline: a failure is
/// logged once here and the caller continues with `fallback()` (usually an
/// empty value, or the input unchanged).
///
/// # Arguments
///
/// * `op` - Short name of the operation, used as a log field
/// * `target` - The URL or key the operation worked on
/// * `result` - Outcome of the operation
/// * `fallback` - Produces the value used when `result` is an error
pub fn fail_open<T, E: fmt::Display>(
    op: &str,
    target: &str,
    result: Result<T, E>,
    fallback: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(op, %target, error = %e, "Operation failed; continuing without it");
            fallback()
        }
    }
}

/// Parse a timestamp as sent by feeds into a naive UTC datetime.
///
/// Accepts RFC 3339 (including a trailing `Z`), offset-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` as WordPress emits it, and bare dates. Values
/// carrying an offset are converted to UTC.
///
/// # Returns
///
/// `None` for empty or unparsable input.
pub fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date shown in a dispatched message.
///
/// Prefers the ISO value, then the source's own text, then today's UTC date.
pub fn display_date(date_iso: &str, date_text: &str) -> String {
    if !date_iso.is_empty() {
        date_iso.to_string()
    } else if !date_text.is_empty() {
        date_text.to_string()
    } else {
        Utc::now().format("%Y-%m-%d").to_string()
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure the directory that will hold `file` exists and is writable.
///
/// Creates the directory if needed, then performs a write test by creating
/// and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %file.display()))]
pub async fn ensure_writable_parent(file: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    let probe_path = dir.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!(dir = %dir.display(), "Seen store directory is writable");
    Ok(())
}

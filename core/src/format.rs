//! Display formatting for discovery rows.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human readable size using base 1024, capped at TB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `YYYY-MM-DD` for RFC 3339 input; empty stays empty, anything else is
/// returned untouched.
pub fn format_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|ts| ts.format(&format_description!("[year]-[month]-[day]")).ok())
        .unwrap_or_else(|| raw.to_string())
}

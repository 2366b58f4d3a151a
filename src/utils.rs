//! Shared utility functions for the effluent trend service

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Timestamp layouts accepted from text cells, tried in order
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Date-only layouts accepted from text cells, tried in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse a timestamp written as text
///
/// Accepts ISO-style date-times and plain dates (midnight is assumed).
///
/// # Examples
///
/// ```
/// use effluent_trend_service::utils::parse_datetime_text;
///
/// let dt = parse_datetime_text("2024-03-01").unwrap();
/// assert_eq!(dt.to_string(), "2024-03-01 00:00:00");
/// assert!(parse_datetime_text("not a date").is_none());
/// ```
pub fn parse_datetime_text(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert an Excel serial date (days since 1899-12-30, fraction = time of day)
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    base.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Name of the derived moving-average column for a metric
pub fn moving_average_column(metric: &str) -> String {
    format!("{metric}_MA")
}

/// File-system friendly name for a metric, e.g. "COD F/D" -> "cod_f_d"
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_sep = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        "metric".to_string()
    } else {
        slug
    }
}

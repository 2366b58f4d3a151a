use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Timestamp layout used when a cell is written to CSV
///
/// Fractional seconds are written only when present.
pub const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single value in a measurement table
///
/// Serializes untagged so the JSON view of a row reads like the spreadsheet:
/// numbers as numbers, text as strings, missing values as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Empty cells and NaN numbers both count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    /// Hashable identity used for duplicate detection
    pub(crate) fn key(&self) -> CellKey<'_> {
        match self {
            Cell::Empty => CellKey::Empty,
            // -0.0 and 0.0 compare equal, so they must hash equal too
            Cell::Number(n) if *n == 0.0 => CellKey::Number(0.0f64.to_bits()),
            Cell::Number(n) => CellKey::Number(n.to_bits()),
            Cell::Text(s) => CellKey::Text(s.as_str()),
            Cell::Bool(b) => CellKey::Bool(*b),
            Cell::DateTime(dt) => CellKey::DateTime(*dt),
        }
    }

    /// Text written to a CSV field
    pub fn to_csv_field(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) if n.is_nan() => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) => dt.format(CSV_DATETIME_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => write!(f, "<empty>"),
            other => write!(f, "{}", other.to_csv_field()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    Empty,
    Number(u64),
    Text(&'a str),
    Bool(bool),
    DateTime(NaiveDateTime),
}

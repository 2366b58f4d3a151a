use thiserror::Error;
use tracing::info;

use super::normalize_headers;
use crate::table::{Cell, Table, TableError};
use crate::utils::parse_datetime_text;

#[derive(Error, Debug)]
pub enum CsvImportError {
    #[error("Failed to read CSV: {0}")]
    Read(#[from] csv::Error),

    #[error("CSV has no header row")]
    MissingHeader,

    #[error("Invalid table shape: {0}")]
    Shape(#[from] TableError),
}

/// Parser for comma-separated uploads, including this service's own `processed_data.csv`
pub struct CsvImporter<'a> {
    bytes: &'a [u8],
}

impl<'a> CsvImporter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn parse(&self) -> Result<Table, CsvImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(self.bytes);

        let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if raw_headers.iter().all(|h| h.trim().is_empty()) {
            return Err(CsvImportError::MissingHeader);
        }

        let columns = normalize_headers(raw_headers);
        let width = columns.len();
        let mut table = Table::new(columns);

        for record in reader.records() {
            let record = record?;
            let mut cells: Vec<Cell> = record.iter().take(width).map(infer_cell).collect();
            cells.resize(width, Cell::Empty);
            table.push_row(cells)?;
        }

        info!(
            "Parsed {} rows x {} columns from CSV upload",
            table.len(),
            table.columns().len()
        );
        Ok(table)
    }
}

/// Best-effort typing of a CSV field
fn infer_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return Cell::Number(n);
    }
    if let Some(dt) = parse_datetime_text(trimmed) {
        return Cell::DateTime(dt);
    }
    match trimmed {
        "true" | "True" | "TRUE" => Cell::Bool(true),
        "false" | "False" | "FALSE" => Cell::Bool(false),
        _ => Cell::Text(field.to_string()),
    }
}

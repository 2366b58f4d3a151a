use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::normalize_headers;
use crate::table::{Cell, Table, TableError};
use crate::utils::parse_datetime_text;

#[derive(Error, Debug)]
pub enum ExcelImportError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Workbook contains no worksheets")]
    NoSheets,

    #[error("Failed to read worksheet: {0}")]
    SheetRead(String),

    #[error("Worksheet has no header row")]
    MissingHeader,

    #[error("Invalid table shape: {0}")]
    Shape(#[from] TableError),
}

/// Parser for uploaded effluent workbooks (`.xlsx`, first sheet only)
///
/// The first row of the sheet holds column names; every following row is
/// one measurement. Parsing is synchronous, async callers should use
/// `spawn_blocking`.
pub struct ExcelImporter<'a> {
    bytes: &'a [u8],
}

impl<'a> ExcelImporter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn open(&self) -> Result<Xlsx<Cursor<&'a [u8]>>, ExcelImportError> {
        Xlsx::new(Cursor::new(self.bytes)).map_err(|e| ExcelImportError::WorkbookOpen(e.to_string()))
    }

    /// Names of all worksheets, in workbook order
    pub fn sheet_names(&self) -> Result<Vec<String>, ExcelImportError> {
        Ok(self.open()?.sheet_names())
    }

    /// Parse the first worksheet into a table
    pub fn parse_first_sheet(&self) -> Result<Table, ExcelImportError> {
        let mut workbook = self.open()?;

        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => return Err(ExcelImportError::SheetRead(e.to_string())),
            None => return Err(ExcelImportError::NoSheets),
        };

        let table = self.parse_range(&range)?;
        info!(
            "Parsed {} rows x {} columns from uploaded workbook",
            table.len(),
            table.columns().len()
        );
        Ok(table)
    }

    fn parse_range(&self, range: &Range<Data>) -> Result<Table, ExcelImportError> {
        let mut rows = range.rows();

        let header_row = rows.next().ok_or(ExcelImportError::MissingHeader)?;
        if header_row.iter().all(|cell| matches!(cell, Data::Empty)) {
            return Err(ExcelImportError::MissingHeader);
        }

        let columns = normalize_headers(header_row.iter().map(Self::header_name).collect());
        let width = columns.len();
        debug!("Header columns: {:?}", columns);

        let mut table = Table::new(columns);
        for (row_idx, row) in rows.enumerate() {
            let mut cells: Vec<Cell> = row.iter().take(width).map(Self::convert_cell).collect();
            if cells.len() < width {
                debug!("Padding short row {} with {} empty cells", row_idx, width - cells.len());
                cells.resize(width, Cell::Empty);
            }
            table.push_row(cells)?;
        }

        Ok(table)
    }

    fn header_name(cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
            Data::Empty => String::new(),
            other => other.to_string(),
        }
    }

    /// Map a spreadsheet value onto a table cell
    fn convert_cell(cell: &Data) -> Cell {
        match cell {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.clone())
                }
            }
            Data::DateTime(excel_date) => match excel_date.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => {
                    warn!("Date cell out of range, keeping serial {}", excel_date.as_f64());
                    Cell::Number(excel_date.as_f64())
                }
            },
            Data::DateTimeIso(s) => parse_datetime_text(s)
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Text(s.clone())),
            // #N/A, #DIV/0! and friends read as missing values
            Data::Error(e) => {
                debug!("Spreadsheet error cell {:?} treated as missing", e);
                Cell::Empty
            }
            Data::Empty => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_workbook_bytes() {
        let importer = ExcelImporter::new(b"PK\x03\x04 definitely not a zip archive");
        assert!(matches!(
            importer.parse_first_sheet(),
            Err(ExcelImportError::WorkbookOpen(_))
        ));
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(ExcelImporter::convert_cell(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(ExcelImporter::convert_cell(&Data::Float(1.25)), Cell::Number(1.25));
        assert_eq!(
            ExcelImporter::convert_cell(&Data::String("   ".into())),
            Cell::Empty
        );
        assert_eq!(
            ExcelImporter::convert_cell(&Data::String("n.d.".into())),
            Cell::Text("n.d.".into())
        );
        assert_eq!(
            ExcelImporter::convert_cell(&Data::Error(calamine::CellErrorType::NA)),
            Cell::Empty
        );
        assert!(matches!(
            ExcelImporter::convert_cell(&Data::DateTimeIso("2024-01-02T08:30:00".into())),
            Cell::DateTime(_)
        ));
    }

    #[test]
    fn test_header_name() {
        assert_eq!(ExcelImporter::header_name(&Data::String("COD F/D".into())), "COD F/D");
        assert_eq!(ExcelImporter::header_name(&Data::Float(2024.0)), "2024");
        assert_eq!(ExcelImporter::header_name(&Data::Empty), "");
    }
}

// ! Upload parsers for Excel workbooks and CSV exports

pub mod csv_importer;
pub mod excel_importer;

// Re-export commonly used items
pub use csv_importer::{CsvImportError, CsvImporter};
pub use excel_importer::{ExcelImportError, ExcelImporter};

use thiserror::Error;
use tracing::debug;

use crate::table::Table;

/// Local file header signature shared by every `.xlsx` (ZIP) container
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Excel(#[from] ExcelImportError),

    #[error(transparent)]
    Csv(#[from] CsvImportError),

    #[error("Unrecognized file format: expected an .xlsx workbook or UTF-8 CSV")]
    UnrecognizedFormat,
}

/// Format of an uploaded file, sniffed from its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Xlsx,
    Csv,
}

impl UploadFormat {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(ZIP_SIGNATURE) {
            Some(UploadFormat::Xlsx)
        } else if !bytes.is_empty() && std::str::from_utf8(bytes).is_ok() {
            Some(UploadFormat::Csv)
        } else {
            None
        }
    }
}

/// Parse uploaded bytes into a measurement table
pub fn parse_upload(bytes: &[u8]) -> Result<Table, ImportError> {
    let format = UploadFormat::detect(bytes).ok_or(ImportError::UnrecognizedFormat)?;
    debug!("Detected upload format {:?} ({} bytes)", format, bytes.len());

    match format {
        UploadFormat::Xlsx => Ok(ExcelImporter::new(bytes).parse_first_sheet()?),
        UploadFormat::Csv => Ok(CsvImporter::new(bytes).parse()?),
    }
}

/// Header names as a spreadsheet reader presents them
///
/// Blank headers become `Unnamed: <index>`; repeated names get `.1`, `.2`, ...
pub(crate) fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());

    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while headers.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        headers.push(candidate);
    }

    headers
}

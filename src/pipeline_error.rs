use crate::importers::ImportError;
use crate::table::TableError;

/// Failure while cleaning, estimating trends, or rendering charts
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Missing expected column: {0}")]
    MissingColumn(String),
    #[error("Non-numeric value {value:?} in column {column} at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Invalid date {value:?} at row {row}")]
    InvalidDate { row: usize, value: String },
    #[error("Moving average window must be at least 1")]
    ZeroWindow,
    #[error("Failed to render chart for {metric}: {message}")]
    Render { metric: String, message: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Everything that can stop an upload from producing a processed table
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("File size of {size} bytes exceeds the {limit} byte limit. Please upload a smaller file.")]
    UploadRejected { size: usize, limit: usize },
    #[error("Error reading the uploaded file: {0}")]
    ParseFailure(#[from] ImportError),
    #[error("Error processing the data: {0}")]
    ProcessingFailure(#[from] ProcessingError),
}

impl PipelineError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UploadRejected { .. } => "upload_rejected",
            PipelineError::ParseFailure(_) => "parse_failure",
            PipelineError::ProcessingFailure(_) => "processing_failure",
        }
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::importers::parse_upload;
use crate::metrics::{self, MetricDefinition};
use crate::pipeline_error::{PipelineError, ProcessingError};
use crate::services::chart_renderer::{Chart, ChartOptions, ChartRenderer};
use crate::services::{cleaner, trend_estimator};
use crate::table::csv_export::PROCESSED_CSV_FILENAME;
use crate::table::{Table, TableError};
use crate::utils::slugify;

/// Largest upload accepted, in bytes
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50_000;

/// Result of a successful upload: cleaned, augmented table plus one chart per metric
#[derive(Debug, Clone)]
pub struct ProcessedTable {
    /// Rows in the file as uploaded, before cleaning
    pub uploaded_rows: usize,
    pub table: Table,
    /// Charts in configured metric order
    pub charts: Vec<Chart>,
}

impl ProcessedTable {
    pub fn to_csv(&self) -> Result<Vec<u8>, TableError> {
        self.table.to_csv_bytes()
    }

    /// Write `processed_data.csv` and one `<metric>.svg` per chart into `dir`
    pub fn write_outputs(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let csv = self
            .to_csv()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let csv_path = dir.join(PROCESSED_CSV_FILENAME);
        fs::write(&csv_path, csv)?;

        let mut written = vec![csv_path];
        for chart in &self.charts {
            let path = dir.join(format!("{}.svg", slugify(&chart.metric)));
            fs::write(&path, &chart.svg)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Clean -> moving average per metric -> chart per metric
#[derive(Debug, Clone)]
pub struct PipelineService {
    metrics: Vec<MetricDefinition>,
    max_upload_bytes: usize,
    renderer: ChartRenderer,
}

impl Default for PipelineService {
    fn default() -> Self {
        let metrics = metrics::find(metrics::DEFAULT_METRIC).into_iter().collect();
        Self::new(metrics, DEFAULT_MAX_UPLOAD_BYTES, ChartOptions::default())
    }
}

impl PipelineService {
    pub fn new(
        metrics: Vec<MetricDefinition>,
        max_upload_bytes: usize,
        chart_options: ChartOptions,
    ) -> Self {
        Self {
            metrics,
            max_upload_bytes,
            renderer: ChartRenderer::new(chart_options),
        }
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Validate, parse, and process an uploaded file
    ///
    /// Oversized files are rejected before any parsing. Any failure discards
    /// the whole result; there is no partial table.
    #[instrument(skip(self, file_bytes), fields(size = file_bytes.len()))]
    pub fn process_upload(&self, file_bytes: &[u8]) -> Result<ProcessedTable, PipelineError> {
        if file_bytes.len() > self.max_upload_bytes {
            warn!(
                "Rejecting upload of {} bytes (limit {})",
                file_bytes.len(),
                self.max_upload_bytes
            );
            return Err(PipelineError::UploadRejected {
                size: file_bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        let table = parse_upload(file_bytes).map_err(|e| {
            error!("Failed to parse upload: {}", e);
            PipelineError::from(e)
        })?;

        let uploaded_rows = table.len();
        let (table, charts) = self.process_table(table).map_err(|e| {
            error!("Failed to process upload: {}", e);
            PipelineError::from(e)
        })?;

        Ok(ProcessedTable {
            uploaded_rows,
            table,
            charts,
        })
    }

    /// Run the processing stages on an already-parsed table
    #[instrument(skip(self, table), fields(rows = table.len(), metrics = self.metrics.len()))]
    pub fn process_table(&self, table: Table) -> Result<(Table, Vec<Chart>), ProcessingError> {
        let mut table = cleaner::clean(table);

        for metric in &self.metrics {
            trend_estimator::augment(&mut table, metric)?;
        }

        let charts = self
            .metrics
            .iter()
            .map(|metric| self.renderer.render(&table, metric))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Processed {} rows into {} charts",
            table.len(),
            charts.len()
        );
        Ok((table, charts))
    }
}

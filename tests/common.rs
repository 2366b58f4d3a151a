#![allow(dead_code)]

use effluent_trend_service::metrics;
use effluent_trend_service::services::pipeline_service::DEFAULT_MAX_UPLOAD_BYTES;
use effluent_trend_service::services::{ChartOptions, PipelineService};

/// Sample workbook: 12 daily rows from 2024-01-01, one row missing COD (Jan 6)
/// and one exact duplicate (Jan 9), so cleaning keeps 10 rows.
pub const SAMPLE_WORKBOOK: &str = "sample-data-files/effluent_sample.xlsx";

pub const SAMPLE_UPLOADED_ROWS: usize = 12;
pub const SAMPLE_CLEANED_ROWS: usize = 10;

/// COD F/D values that survive cleaning, in file order
pub const SAMPLE_CLEANED_COD: [f64; 10] =
    [72.0, 85.0, 90.0, 78.0, 95.0, 110.0, 102.0, 88.0, 97.0, 105.0];

pub const ALL_METRICS: [&str; 4] = ["COD F/D", "SS F/D", "BOD F/D", "Zn F/D"];

pub fn sample_workbook_bytes() -> Vec<u8> {
    std::fs::read(SAMPLE_WORKBOOK).expect("Failed to read sample workbook")
}

/// Pipeline charting all four catalog metrics
pub fn four_metric_pipeline() -> PipelineService {
    let metrics = metrics::select(&ALL_METRICS).expect("catalog metrics");
    PipelineService::new(metrics, DEFAULT_MAX_UPLOAD_BYTES, ChartOptions::default())
}

pub mod chart_renderer;
pub mod cleaner;
pub mod pipeline_service;
pub mod trend_estimator;

pub use chart_renderer::{Chart, ChartOptions, ChartRenderer};
pub use pipeline_service::{PipelineService, ProcessedTable};

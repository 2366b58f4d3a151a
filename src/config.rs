use std::env;

use crate::metrics::{self, MetricDefinition};
use crate::services::chart_renderer::ChartOptions;
use crate::services::pipeline_service::{PipelineService, DEFAULT_MAX_UPLOAD_BYTES};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MOVING_AVERAGE_WINDOW must be at least 1")]
    ZeroWindow,
    #[error("Unknown metric(s) in METRICS: {}", .0.join(", "))]
    UnknownMetrics(Vec<String>),
    #[error("METRICS must name at least one metric")]
    NoMetrics,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_upload_bytes: usize,
    pub moving_average_window: usize,
    pub metrics: Vec<MetricDefinition>,
    pub chart_width: u32,
    pub chart_height: u32,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let moving_average_window = parse_or("MOVING_AVERAGE_WINDOW", metrics::DEFAULT_WINDOW);
        let metric_names =
            env::var("METRICS").unwrap_or_else(|_| metrics::DEFAULT_METRIC.to_string());

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", 8080),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            moving_average_window,
            metrics: Self::resolve_metrics(&metric_names, moving_average_window)?,
            chart_width: parse_or("CHART_WIDTH", 1200),
            chart_height: parse_or("CHART_HEIGHT", 600),
        })
    }

    /// Turn a comma-separated metric list into catalog entries using `window`
    pub fn resolve_metrics(
        names: &str,
        window: usize,
    ) -> Result<Vec<MetricDefinition>, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        let names: Vec<&str> = names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ConfigError::NoMetrics);
        }

        let selected = metrics::select(names.as_slice()).map_err(ConfigError::UnknownMetrics)?;
        Ok(selected.into_iter().map(|m| m.with_window(window)).collect())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            width: self.chart_width,
            height: self.chart_height,
        }
    }

    pub fn pipeline_service(&self) -> PipelineService {
        PipelineService::new(
            self.metrics.clone(),
            self.max_upload_bytes,
            self.chart_options(),
        )
    }
}

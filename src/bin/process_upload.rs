use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use effluent_trend_service::config::Config;
use effluent_trend_service::metrics;
use effluent_trend_service::services::pipeline_service::DEFAULT_MAX_UPLOAD_BYTES;
use effluent_trend_service::services::{ChartOptions, PipelineService};

#[derive(Parser)]
#[command(name = "process-upload")]
#[command(about = "Clean an effluent workbook, add moving averages, and render threshold charts", long_about = None)]
struct Cli {
    /// Path to the .xlsx workbook (or CSV) to process
    file: PathBuf,

    /// Directory that receives processed_data.csv and one SVG chart per metric
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Comma-separated metric columns to chart, in order (e.g. "COD F/D,SS F/D")
    #[arg(long, env = "METRICS", default_value = metrics::DEFAULT_METRIC)]
    metrics: String,

    /// Moving average window
    #[arg(long, env = "MOVING_AVERAGE_WINDOW", default_value_t = metrics::DEFAULT_WINDOW)]
    window: usize,

    /// Reject files larger than this many bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let start = Instant::now();

    let metrics = Config::resolve_metrics(&cli.metrics, cli.window)?;
    let pipeline = PipelineService::new(metrics, cli.max_upload_bytes, ChartOptions::default());

    info!("Reading {}", cli.file.display());
    let bytes = std::fs::read(&cli.file)?;

    let processed = match pipeline.process_upload(&bytes) {
        Ok(processed) => processed,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!(
        "Kept {} of {} rows, rendered {} chart(s)",
        processed.table.len(),
        processed.uploaded_rows,
        processed.charts.len()
    );

    for path in processed.write_outputs(&cli.output_dir)? {
        info!("Wrote {}", path.display());
    }

    info!("Done in {:.2?}", start.elapsed());
    Ok(())
}

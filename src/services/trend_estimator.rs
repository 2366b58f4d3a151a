use tracing::{debug, instrument};

use crate::metrics::MetricDefinition;
use crate::pipeline_error::ProcessingError;
use crate::table::{Cell, Table};
use crate::utils::moving_average_column;

/// Trailing simple moving average
///
/// `output[i]` is the arithmetic mean of `series[i + 1 - window ..= i]`; the
/// first `window - 1` entries have no value. A window longer than the series
/// yields a series of `None` of the same length.
pub fn moving_average(series: &[f64], window: usize) -> Result<Vec<Option<f64>>, ProcessingError> {
    if window == 0 {
        return Err(ProcessingError::ZeroWindow);
    }

    let n = window as f64;
    let warmup = (window - 1).min(series.len());
    let mut output = vec![None; warmup];
    output.extend(series.windows(window).map(|w| {
        let sum = w.iter().sum::<f64>();
        // a sum past f64::MAX still has a representable mean
        if sum.is_finite() {
            Some(sum / n)
        } else {
            Some(w.iter().map(|v| v / n).sum())
        }
    }));
    Ok(output)
}

/// Numeric view of a metric column
///
/// Text cells holding a number are accepted; anything else is an error.
pub fn numeric_column(table: &Table, column: &str) -> Result<Vec<f64>, ProcessingError> {
    let cells = table
        .column(column)
        .map_err(|_| ProcessingError::MissingColumn(column.to_string()))?;

    cells
        .into_iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            Cell::Number(n) => Ok(*n),
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| ProcessingError::NonNumeric {
                column: column.to_string(),
                row,
                value: s.clone(),
            }),
            other => Err(ProcessingError::NonNumeric {
                column: column.to_string(),
                row,
                value: other.to_string(),
            }),
        })
        .collect()
}

/// Add the `<metric>_MA` column for one metric
#[instrument(skip(table, metric), fields(metric = %metric.name, window = metric.window))]
pub fn augment(table: &mut Table, metric: &MetricDefinition) -> Result<(), ProcessingError> {
    let series = numeric_column(table, &metric.name)?;
    let averaged = moving_average(&series, metric.window)?;
    let defined = averaged.iter().filter(|v| v.is_some()).count();

    table.add_column(
        &moving_average_column(&metric.name),
        averaged.into_iter().map(Cell::from_option).collect(),
    )?;

    debug!(
        "Computed {} moving-average values over {} rows",
        defined,
        series.len()
    );
    Ok(())
}

use chrono::{DateTime, NaiveDateTime};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::metrics::{MetricDefinition, Rgb};
use crate::pipeline_error::ProcessingError;
use crate::services::trend_estimator::numeric_column;
use crate::table::{Cell, Table};
use crate::utils::{excel_serial_to_datetime, moving_average_column, parse_datetime_text};

/// Column holding the measurement timestamp
pub const DATE_COLUMN: &str = "Date";

/// Fraction of the way through the rows at which threshold labels are placed
pub const ANNOTATION_POSITION: f64 = 0.8;

/// Rotation applied to the date tick labels, in degrees
pub const TICK_LABEL_ANGLE: i32 = -45;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MAX_X_TICKS: usize = 10;
const ACTUAL_COLOR: RGBColor = RGBColor(31, 119, 180);
const AVERAGE_COLOR: RGBColor = RGBColor(255, 127, 14);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Point {
    pub date: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ThresholdLine {
    pub value: f64,
    /// Legend entry, e.g. "Standard A (80 mg/L)"
    pub legend: String,
    #[schema(value_type = String)]
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

/// Text label pinned to a threshold line
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Annotation {
    pub text: String,
    pub date: NaiveDateTime,
    pub value: f64,
    #[schema(value_type = String)]
    pub color: Rgb,
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
}

/// One rendered metric chart plus the data it was drawn from
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Chart {
    pub metric: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub actual_label: String,
    pub moving_average_label: String,
    pub actual: Vec<Point>,
    /// Only the positions where the moving average is defined
    pub moving_average: Vec<Point>,
    pub thresholds: Vec<ThresholdLine>,
    pub annotations: Vec<Annotation>,
    /// Self-contained SVG document
    pub svg: String,
}

/// Timestamps of the `Date` column
///
/// Accepts date cells, date text, and Excel serial numbers.
pub fn date_column(table: &Table) -> Result<Vec<NaiveDateTime>, ProcessingError> {
    let cells = table
        .column(DATE_COLUMN)
        .map_err(|_| ProcessingError::MissingColumn(DATE_COLUMN.to_string()))?;

    cells
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            let parsed = match cell {
                Cell::DateTime(dt) => Some(*dt),
                Cell::Text(s) => parse_datetime_text(s),
                Cell::Number(n) => excel_serial_to_datetime(*n),
                _ => None,
            };
            parsed.ok_or_else(|| ProcessingError::InvalidDate {
                row,
                value: cell.to_string(),
            })
        })
        .collect()
}

/// Index of the row whose date anchors the threshold labels, `None` for an empty table
pub fn annotation_index(rows: usize) -> Option<usize> {
    if rows == 0 {
        return None;
    }
    let idx = (rows as f64 * ANNOTATION_POSITION).floor() as usize;
    Some(idx.min(rows - 1))
}

#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    options: ChartOptions,
}

impl ChartRenderer {
    pub fn new(options: ChartOptions) -> Self {
        Self { options }
    }

    /// Build the chart for one metric from a table that already carries `<metric>_MA`
    #[instrument(skip(self, table, metric), fields(metric = %metric.name, rows = table.len()))]
    pub fn render(&self, table: &Table, metric: &MetricDefinition) -> Result<Chart, ProcessingError> {
        let dates = date_column(table)?;
        let values = numeric_column(table, &metric.name)?;
        let averages = self.moving_average_values(table, metric)?;

        let actual = dates
            .iter()
            .zip(&values)
            .map(|(date, value)| Point {
                date: *date,
                value: *value,
            })
            .collect();

        let moving_average = dates
            .iter()
            .zip(&averages)
            .filter_map(|(date, value)| {
                value.map(|value| Point {
                    date: *date,
                    value,
                })
            })
            .collect();

        let thresholds = metric
            .standards
            .iter()
            .map(|standard| ThresholdLine {
                value: standard.value,
                legend: metric.standard_legend(standard),
                color: standard.color,
            })
            .collect();

        let annotations = match annotation_index(dates.len()) {
            Some(idx) => metric
                .standards
                .iter()
                .map(|standard| Annotation {
                    text: standard.label.clone(),
                    date: dates[idx],
                    value: standard.value,
                    color: standard.color,
                    horizontal_align: HorizontalAlign::Right,
                    vertical_align: VerticalAlign::Bottom,
                })
                .collect(),
            None => {
                debug!("No rows to anchor threshold labels, skipping annotations");
                Vec::new()
            }
        };

        let mut chart = Chart {
            metric: metric.name.clone(),
            title: format!("Actual vs Moving Average {} with Standards", metric.name),
            x_label: DATE_COLUMN.to_string(),
            y_label: metric.name.clone(),
            actual_label: format!("Actual {}", metric.name),
            moving_average_label: format!("Moving Average (window={})", metric.window),
            actual,
            moving_average,
            thresholds,
            annotations,
            svg: String::new(),
        };

        chart.svg = self.render_svg(&chart)?;
        debug!("Rendered {} byte SVG", chart.svg.len());
        Ok(chart)
    }

    fn moving_average_values(
        &self,
        table: &Table,
        metric: &MetricDefinition,
    ) -> Result<Vec<Option<f64>>, ProcessingError> {
        let column = moving_average_column(&metric.name);
        let cells = table
            .column(&column)
            .map_err(|_| ProcessingError::MissingColumn(column.clone()))?;

        cells
            .into_iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                Cell::Number(n) if !n.is_nan() => Ok(Some(*n)),
                c if c.is_missing() => Ok(None),
                other => Err(ProcessingError::NonNumeric {
                    column: column.clone(),
                    row,
                    value: other.to_string(),
                }),
            })
            .collect()
    }

    fn render_svg(&self, chart: &Chart) -> Result<String, ProcessingError> {
        let render_error = |message: String| ProcessingError::Render {
            metric: chart.metric.clone(),
            message,
        };

        // plotters cannot lay out an axis whose span is not a finite number
        let x_range = x_bounds(chart);
        let y_range = y_bounds(chart);
        if !(y_range.1 - y_range.0).is_finite() || !(x_range.1 - x_range.0).is_finite() {
            return Err(render_error(format!(
                "values from {} to {} span too wide a range to plot",
                y_range.0, y_range.1
            )));
        }

        let mut svg = String::new();
        let tick_labels = {
            let root = SVGBackend::with_string(&mut svg, (self.options.width, self.options.height))
                .into_drawing_area();
            let tick_labels = draw_chart(&root, chart, x_range, y_range)
                .map_err(|e| render_error(e.to_string()))?;
            root.present().map_err(|e| render_error(e.to_string()))?;
            tick_labels
        };

        // the SVG backend only rotates text by quarter turns
        let labels: String = tick_labels.iter().map(TickLabel::to_svg).collect();
        let end = svg
            .rfind("</svg>")
            .ok_or_else(|| render_error("SVG output has no closing tag".to_string()))?;
        svg.insert_str(end, &labels);
        Ok(svg)
    }
}

fn to_days(date: &NaiveDateTime) -> f64 {
    date.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn format_day(days: &f64) -> String {
    DateTime::from_timestamp((days * SECONDS_PER_DAY).round() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Date label under one x tick, positioned in SVG pixels
#[derive(Debug, Clone, PartialEq)]
struct TickLabel {
    x: i32,
    y: i32,
    text: String,
}

impl TickLabel {
    fn to_svg(&self) -> String {
        format!(
            r#"<text x="{x}" y="{y}" font-family="sans-serif" font-size="12" text-anchor="end" dominant-baseline="hanging" transform="rotate({TICK_LABEL_ANGLE} {x} {y})">{text}</text>"#,
            x = self.x,
            y = self.y,
            text = self.text,
        )
    }
}

/// Whole-day tick positions across `[min, max]`, at most `MAX_X_TICKS` of them
fn x_ticks((min, max): (f64, f64)) -> Vec<f64> {
    let first = min.ceil();
    let last = max.floor();
    if last < first {
        return Vec::new();
    }
    let step = ((last - first) / (MAX_X_TICKS - 1) as f64).ceil().max(1.0);
    (0..MAX_X_TICKS)
        .map(|i| first + step * i as f64)
        .take_while(|day| *day <= last)
        .collect()
}

fn plot_color(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// Date span in days; a single date or an empty table gets a one-day window
fn x_bounds(chart: &Chart) -> (f64, f64) {
    let days: Vec<f64> = chart.actual.iter().map(|p| to_days(&p.date)).collect();
    let min = days.iter().copied().fold(f64::INFINITY, f64::min);
    let max = days.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() {
        (0.0, 1.0)
    } else if max - min < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        padded(min, max, 0.02)
    }
}

/// Value span covering both series and every threshold line
fn y_bounds(chart: &Chart) -> (f64, f64) {
    let values = chart
        .actual
        .iter()
        .chain(&chart.moving_average)
        .map(|p| p.value)
        .chain(chart.thresholds.iter().map(|t| t.value))
        .filter(|v| v.is_finite());

    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !min.is_finite() {
        (0.0, 1.0)
    } else if max - min < f64::EPSILON {
        let pad = (min.abs() * 0.1).max(1.0);
        ((min - pad).max(f64::MIN), (max + pad).min(f64::MAX))
    } else {
        padded(min, max, 0.1)
    }
}

/// Widen `[min, max]` by `fraction` of its span on each side
///
/// The padding shrinks near the ends of `f64` so that the widened span stays
/// finite. A span that already overflows is returned unchanged.
fn padded(min: f64, max: f64, fraction: f64) -> (f64, f64) {
    let span = max - min;
    if !span.is_finite() {
        return (min, max);
    }
    let pad = (span * fraction).min((f64::MAX - span) * 0.45);
    ((min - pad).max(f64::MIN), (max + pad).min(f64::MAX))
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &Chart,
    (x_min, x_max): (f64, f64),
    (y_min, y_max): (f64, f64),
) -> Result<Vec<TickLabel>, DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(100)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    // date ticks are drawn by hand below so their labels can be slanted
    ctx.configure_mesh()
        .x_desc(&chart.x_label)
        .y_desc(&chart.y_label)
        .x_labels(0)
        .draw()?;

    let mut tick_labels = Vec::new();
    for day in x_ticks((x_min, x_max)) {
        let (x, y) = ctx.backend_coord(&(day, y_min));
        root.draw(&PathElement::new(vec![(x, y), (x, y + 5)], BLACK.stroke_width(1)))?;
        tick_labels.push(TickLabel {
            x,
            y: y + 8,
            text: format_day(&day),
        });
    }

    ctx.draw_series(LineSeries::new(
        chart.actual.iter().map(|p| (to_days(&p.date), p.value)),
        ACTUAL_COLOR.stroke_width(2),
    ))?
    .label(&chart.actual_label)
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], ACTUAL_COLOR.stroke_width(2)));

    ctx.draw_series(LineSeries::new(
        chart.moving_average.iter().map(|p| (to_days(&p.date), p.value)),
        AVERAGE_COLOR.stroke_width(2),
    ))?
    .label(&chart.moving_average_label)
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], AVERAGE_COLOR.stroke_width(2)));

    for threshold in &chart.thresholds {
        let color = plot_color(threshold.color);
        ctx.draw_series(DashedLineSeries::new(
            vec![(x_min, threshold.value), (x_max, threshold.value)],
            10,
            6,
            color.stroke_width(2),
        ))?
        .label(&threshold.legend)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    for annotation in &chart.annotations {
        let color = plot_color(annotation.color);
        let style = ("sans-serif", 14)
            .into_font()
            .color(&color)
            .pos(Pos::new(HPos::Right, VPos::Bottom));
        ctx.draw_series(std::iter::once(Text::new(
            annotation.text.clone(),
            (to_days(&annotation.date), annotation.value),
            style,
        )))?;
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    Ok(tick_labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;
    use crate::services::trend_estimator::augment;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn cod_table(values: &[f64]) -> Table {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| vec![Cell::DateTime(day(i as u32 + 1)), Cell::Number(*v)])
            .collect();
        let mut table = Table::from_rows(vec!["Date".into(), "COD F/D".into()], rows).unwrap();
        augment(&mut table, &metrics::find("COD F/D").unwrap()).unwrap();
        table
    }

    #[test]
    fn test_annotation_index() {
        assert_eq!(annotation_index(0), None);
        assert_eq!(annotation_index(1), Some(0));
        assert_eq!(annotation_index(5), Some(4));
        assert_eq!(annotation_index(10), Some(8));
        assert_eq!(annotation_index(12), Some(9));
    }

    #[test]
    fn test_render_chart_contents() {
        let table = cod_table(&[72.0, 85.0, 90.0, 78.0, 95.0, 110.0, 102.0, 88.0, 97.0, 105.0]);
        let cod = metrics::find("COD F/D").unwrap();

        let chart = ChartRenderer::default().render(&table, &cod).unwrap();

        assert_eq!(chart.title, "Actual vs Moving Average COD F/D with Standards");
        assert_eq!(chart.x_label, "Date");
        assert_eq!(chart.y_label, "COD F/D");
        assert_eq!(chart.moving_average_label, "Moving Average (window=5)");
        assert_eq!(chart.actual.len(), 10);
        assert_eq!(chart.moving_average.len(), 6);
        assert_eq!(chart.moving_average[0].date, day(5));
        assert_eq!(chart.moving_average[0].value, 84.0);

        let legends: Vec<&str> = chart.thresholds.iter().map(|t| t.legend.as_str()).collect();
        assert_eq!(legends, vec!["Standard A (80 mg/L)", "Standard B (100 mg/L)"]);

        assert_eq!(chart.annotations.len(), 2);
        assert_eq!(chart.annotations[0].text, "Standard A");
        assert_eq!(chart.annotations[0].date, day(9));
        assert_eq!(chart.annotations[0].value, 80.0);
        assert_eq!(chart.annotations[0].color, Rgb::BLUE);
        assert_eq!(chart.annotations[1].color, Rgb::GREEN);
        assert_eq!(chart.annotations[1].horizontal_align, HorizontalAlign::Right);
        assert_eq!(chart.annotations[1].vertical_align, VerticalAlign::Bottom);

        assert!(chart.svg.contains("<svg"));
        assert!(chart.svg.contains("Standard A (80 mg/L)"));
        assert!(chart.svg.contains("Moving Average (window=5)"));
    }

    #[test]
    fn test_render_empty_table_skips_annotations() {
        let table = cod_table(&[]);
        let cod = metrics::find("COD F/D").unwrap();

        let chart = ChartRenderer::default().render(&table, &cod).unwrap();

        assert!(chart.actual.is_empty());
        assert!(chart.moving_average.is_empty());
        assert!(chart.annotations.is_empty());
        assert_eq!(chart.thresholds.len(), 2);
        assert!(chart.svg.contains("COD F/D"));
        assert!(chart.svg.contains("Standard B (100 mg/L)"));
    }

    #[test]
    fn test_render_single_row() {
        let table = cod_table(&[72.0]);
        let cod = metrics::find("COD F/D").unwrap();

        let chart = ChartRenderer::default().render(&table, &cod).unwrap();

        assert_eq!(chart.actual.len(), 1);
        assert!(chart.moving_average.is_empty());
        assert_eq!(chart.annotations.len(), 2);
        assert_eq!(chart.annotations[0].date, day(1));
    }

    #[test]
    fn test_x_ticks() {
        assert_eq!(x_ticks((0.0, 1.0)), vec![0.0, 1.0]);
        assert_eq!(x_ticks((0.5, 3.5)), vec![1.0, 2.0, 3.0]);
        assert_eq!(x_ticks((0.2, 0.8)), Vec::<f64>::new());

        let many = x_ticks((0.0, 100.0));
        assert!(many.len() <= MAX_X_TICKS);
        assert_eq!(many[0], 0.0);
        assert_eq!(many[1], 12.0);
    }

    #[test]
    fn test_tick_labels_are_slanted() {
        let table = cod_table(&[72.0, 85.0, 90.0]);
        let cod = metrics::find("COD F/D").unwrap();

        let chart = ChartRenderer::default().render(&table, &cod).unwrap();

        assert!(chart.svg.contains(">2024-01-02</text>"));
        assert!(chart.svg.contains("transform=\"rotate(-45 "));
        assert!(chart.svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_render_values_near_f64_max() {
        let mut values = vec![1.7e308; 5];
        values.push(1.0);
        let table = cod_table(&values);
        let cod = metrics::find("COD F/D").unwrap();

        let chart = ChartRenderer::default().render(&table, &cod).unwrap();

        assert_eq!(chart.actual.len(), 6);
        assert!(chart.svg.contains("<svg"));
        let (lo, hi) = y_bounds(&chart);
        assert!(lo.is_finite() && hi.is_finite());
        assert!(hi >= 1.7e308);
    }

    #[test]
    fn test_render_rejects_unplottable_span() {
        let table = cod_table(&[-1.7e308, 1.7e308]);
        let cod = metrics::find("COD F/D").unwrap();

        let result = ChartRenderer::default().render(&table, &cod);
        assert!(matches!(
            result,
            Err(ProcessingError::Render { metric, .. }) if metric == "COD F/D"
        ));
    }

    #[test]
    fn test_padded_bounds_stay_finite() {
        assert_eq!(padded(0.0, 10.0, 0.1), (-1.0, 11.0));

        let (lo, hi) = padded(1.0, 1.7e308, 0.1);
        assert!(lo < 1.0 && hi > 1.7e308);
        assert!((hi - lo).is_finite());

        assert_eq!(padded(-1.7e308, 1.7e308, 0.1), (-1.7e308, 1.7e308));
    }

    #[test]
    fn test_render_requires_moving_average_column() {
        let table = Table::from_rows(
            vec!["Date".into(), "COD F/D".into()],
            vec![vec![Cell::DateTime(day(1)), Cell::Number(1.0)]],
        )
        .unwrap();
        let cod = metrics::find("COD F/D").unwrap();

        let result = ChartRenderer::default().render(&table, &cod);
        assert!(matches!(
            result,
            Err(ProcessingError::MissingColumn(name)) if name == "COD F/D_MA"
        ));
    }

    #[test]
    fn test_date_column_sources() {
        let table = Table::from_rows(
            vec!["Date".into()],
            vec![
                vec![Cell::DateTime(day(1))],
                vec![Cell::Text("2024-01-02".into())],
                vec![Cell::Number(45294.0)],
            ],
        )
        .unwrap();
        assert_eq!(date_column(&table).unwrap(), vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn test_date_column_rejects_unparseable() {
        let table =
            Table::from_rows(vec!["Date".into()], vec![vec![Cell::Text("soon".into())]]).unwrap();
        assert!(matches!(
            date_column(&table),
            Err(ProcessingError::InvalidDate { row: 0, .. })
        ));
    }

    #[test]
    fn test_format_day_round_trips_dates() {
        assert_eq!(format_day(&to_days(&day(15))), "2024-01-15");
    }
}

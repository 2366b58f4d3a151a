use serde::{Serialize, Serializer};
use utoipa::ToSchema;

/// Trailing window used when a metric does not override it
pub const DEFAULT_WINDOW: usize = 5;

/// Metric charted when no selection is configured (the single-metric upload page)
pub const DEFAULT_METRIC: &str = "COD F/D";

/// An sRGB color, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const RED: Rgb = Rgb(214, 39, 40);

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

/// A regulatory discharge limit drawn as a horizontal reference line
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Standard {
    /// Short name used for the on-chart annotation, e.g. "Standard A"
    pub label: String,
    pub value: f64,
    #[schema(value_type = String, example = "#0000ff")]
    pub color: Rgb,
}

impl Standard {
    pub fn new(label: impl Into<String>, value: f64, color: Rgb) -> Self {
        Self {
            label: label.into(),
            value,
            color,
        }
    }
}

/// Static description of one tracked pollutant column
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MetricDefinition {
    /// Column name in the uploaded sheet
    pub name: String,
    pub unit: String,
    /// Trailing moving-average window
    pub window: usize,
    /// Ordered threshold lines, one or two per metric
    pub standards: Vec<Standard>,
}

impl MetricDefinition {
    /// Legend text for a threshold line, e.g. "Standard A (80 mg/L)"
    pub fn standard_legend(&self, standard: &Standard) -> String {
        format!("{} ({} {})", standard.label, standard.value, self.unit)
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

fn mg_per_litre(name: &str, standards: Vec<Standard>) -> MetricDefinition {
    MetricDefinition {
        name: name.to_string(),
        unit: "mg/L".to_string(),
        window: DEFAULT_WINDOW,
        standards,
    }
}

/// Every metric the service knows how to chart, in canonical chart order
pub fn catalog() -> Vec<MetricDefinition> {
    vec![
        mg_per_litre(
            "COD F/D",
            vec![
                Standard::new("Standard A", 80.0, Rgb::BLUE),
                Standard::new("Standard B", 100.0, Rgb::GREEN),
            ],
        ),
        mg_per_litre(
            "SS F/D",
            vec![
                Standard::new("Standard A", 50.0, Rgb::BLUE),
                Standard::new("Standard B", 100.0, Rgb::GREEN),
            ],
        ),
        mg_per_litre(
            "BOD F/D",
            vec![
                Standard::new("Standard A", 20.0, Rgb::BLUE),
                Standard::new("Standard B", 50.0, Rgb::GREEN),
            ],
        ),
        // Zinc has a single limit shared by both standards
        mg_per_litre("Zn F/D", vec![Standard::new("Standard A/B", 2.0, Rgb::RED)]),
    ]
}

/// Look up a catalog entry by column name (exact match, surrounding whitespace ignored)
pub fn find(name: &str) -> Option<MetricDefinition> {
    let name = name.trim();
    catalog().into_iter().find(|m| m.name == name)
}

/// Resolve an ordered selection of names against the catalog
///
/// Returns the names that are not in the catalog as the error value.
pub fn select<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricDefinition>, Vec<String>> {
    let mut selected = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();

    for name in names {
        match find(name.as_ref()) {
            Some(metric) => {
                if !selected.iter().any(|m: &MetricDefinition| m.name == metric.name) {
                    selected.push(metric);
                }
            }
            None => unknown.push(name.as_ref().trim().to_string()),
        }
    }

    if unknown.is_empty() {
        Ok(selected)
    } else {
        Err(unknown)
    }
}

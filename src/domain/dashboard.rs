// Dashboard domain model
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ordered palette for series without an explicit color and for pie slices.
pub const DEFAULT_PALETTE: [&str; 9] = [
    "#5470c6", "#91cc75", "#fac858", "#ee6666", "#73c0de", "#3ba272", "#fc8452", "#9a60b4",
    "#ea7ccc",
];

pub fn palette_color(index: usize) -> &'static str {
    DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Pie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    pub series_key: String,
    pub kind: ChartKind,
    pub title: String,
    pub color: String,
}

impl SeriesConfig {
    pub fn new(
        series_key: impl Into<String>,
        kind: ChartKind,
        title: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            series_key: series_key.into(),
            kind,
            title: title.into(),
            color: color.into(),
        }
    }

    /// A record key identifies a series by its key or by its title.
    pub fn matches(&self, key: &str) -> bool {
        self.series_key == key || self.title == key
    }
}

/// Bounded observation window of one series.
///
/// `xs` and `ys` are always the same length; index `i` of one pairs with
/// index `i` of the other, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesBuffer {
    pub series_key: String,
    xs: VecDeque<String>,
    ys: VecDeque<f64>,
}

impl SeriesBuffer {
    pub fn new(series_key: impl Into<String>) -> Self {
        Self {
            series_key: series_key.into(),
            xs: VecDeque::new(),
            ys: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Appends one observation and evicts from the front until `capacity` holds.
    pub fn push_windowed(&mut self, x: String, y: f64, capacity: usize) -> usize {
        self.xs.push_back(x);
        self.ys.push_back(y);
        self.trim(capacity)
    }

    /// Drops the oldest pairs beyond `capacity`, returning how many were evicted.
    pub fn trim(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.xs.len() > capacity {
            self.xs.pop_front();
            self.ys.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn replace<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        self.xs.clear();
        self.ys.clear();
        for (x, y) in pairs {
            self.xs.push_back(x);
            self.ys.push_back(y);
        }
    }

    pub fn xs(&self) -> Vec<String> {
        self.xs.iter().cloned().collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.ys.iter().copied().collect()
    }
}

/// Point-in-time copy of one series handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSnapshot {
    pub series_key: String,
    pub kind: ChartKind,
    pub title: String,
    pub color: String,
    pub xs: Vec<String>,
    pub ys: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slice_colors: Vec<String>,
}

impl SeriesSnapshot {
    pub fn capture(config: &SeriesConfig, buffer: &SeriesBuffer) -> Self {
        let slice_colors = match config.kind {
            ChartKind::Pie => (0..buffer.len())
                .map(|i| palette_color(i).to_string())
                .collect(),
            _ => Vec::new(),
        };

        Self {
            series_key: config.series_key.clone(),
            kind: config.kind,
            title: config.title.clone(),
            color: config.color.clone(),
            xs: buffer.xs(),
            ys: buffer.ys(),
            slice_colors,
        }
    }
}

/// Every populated series at one revision, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub revision: u64,
    pub capacity: usize,
    pub series: Vec<SeriesSnapshot>,
}

// Telemetry record domain models

/// One real-time measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub time: String,
    pub value: f64,
    pub series_key: Option<String>,
}

impl DataPoint {
    pub fn new(time: impl Into<String>, value: f64) -> Self {
        Self {
            time: time.into(),
            value,
            series_key: None,
        }
    }

    pub fn keyed(time: impl Into<String>, value: f64, series_key: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            value,
            series_key: Some(series_key.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub name: String,
    pub value: f64,
}

impl BatchRecord {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A full distribution at an instant, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub records: Vec<BatchRecord>,
}

impl Batch {
    pub fn new(records: Vec<BatchRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<BatchRecord> for Batch {
    fn from_iter<I: IntoIterator<Item = BatchRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Unit carried by the distribution hub.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Point(DataPoint),
    Batch { series_key: String, batch: Batch },
}

impl From<DataPoint> for Record {
    fn from(point: DataPoint) -> Self {
        Record::Point(point)
    }
}

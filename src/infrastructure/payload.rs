// Inbound payload decoding - JSON messages to typed records
use crate::domain::error::DashboardError;
use crate::domain::telemetry::{Batch, BatchRecord, DataPoint, Record};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundTime {
    Text(String),
    EpochMillis(i64),
}

#[derive(Debug, Deserialize)]
struct InboundPoint {
    time: InboundTime,
    value: f64,
    #[serde(default, alias = "seriesKey", alias = "topic")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyedBatch {
    #[serde(alias = "seriesKey", alias = "topic")]
    title: String,
    batch: Map<String, Value>,
}

/// Decodes one transport message.
///
/// Accepted shapes:
/// - point: `{"time": "12:00:01" | 1700000000000, "value": 3.2, "title": "cpu"}`
/// - batch: `{"x": 1, "y": 2}`, sent to `default_batch_series`; any object
///   without both `time` and `value` is read as a batch
/// - keyed batch: `{"title": "share", "batch": {"x": 1, "y": 2}}`
/// - point list: `[{"time": "t0", "value": 1}, ...]`, a batch named by time,
///   sent to `default_batch_series`
pub fn decode_record(raw: &str, default_batch_series: Option<&str>) -> Result<Record, DashboardError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| DashboardError::malformed(format!("invalid json: {}", e)))?;

    match value {
        Value::Object(map) if map.contains_key("time") && map.contains_key("value") => {
            let point: InboundPoint = serde_json::from_value(Value::Object(map))
                .map_err(|e| DashboardError::malformed(format!("invalid point: {}", e)))?;
            Ok(Record::Point(into_point(point)?))
        }
        Value::Object(map) if map.contains_key("batch") => {
            let keyed: KeyedBatch = serde_json::from_value(Value::Object(map))
                .map_err(|e| DashboardError::malformed(format!("invalid batch envelope: {}", e)))?;
            Ok(Record::Batch {
                series_key: keyed.title,
                batch: batch_from_map(keyed.batch)?,
            })
        }
        Value::Object(map) => {
            if map.is_empty() {
                return Err(DashboardError::malformed("empty object"));
            }
            Ok(Record::Batch {
                series_key: batch_target(default_batch_series)?,
                batch: batch_from_map(map)?,
            })
        }
        Value::Array(items) => {
            let points: Vec<InboundPoint> = serde_json::from_value(Value::Array(items))
                .map_err(|e| DashboardError::malformed(format!("invalid point list: {}", e)))?;
            let batch = points
                .into_iter()
                .map(|p| into_point(p).map(|p| BatchRecord::new(p.time, p.value)))
                .collect::<Result<Batch, _>>()?;
            Ok(Record::Batch {
                series_key: batch_target(default_batch_series)?,
                batch,
            })
        }
        other => Err(DashboardError::malformed(format!(
            "unsupported payload type {}",
            json_type(&other)
        ))),
    }
}

fn into_point(inbound: InboundPoint) -> Result<DataPoint, DashboardError> {
    let time = match inbound.time {
        InboundTime::Text(text) => text,
        InboundTime::EpochMillis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| DashboardError::malformed(format!("timestamp {} out of range", ms)))?
            .format("%H:%M:%S")
            .to_string(),
    };

    Ok(DataPoint {
        time,
        value: inbound.value,
        series_key: inbound.title,
    })
}

fn batch_from_map(map: Map<String, Value>) -> Result<Batch, DashboardError> {
    map.into_iter()
        .map(|(name, value)| match value.as_f64() {
            Some(v) => Ok(BatchRecord::new(name, v)),
            None => Err(DashboardError::malformed(format!(
                "batch entry {} is not a number",
                name
            ))),
        })
        .collect()
}

fn batch_target(default_batch_series: Option<&str>) -> Result<String, DashboardError> {
    default_batch_series
        .map(str::to_string)
        .ok_or_else(|| DashboardError::malformed("batch without a target series"))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

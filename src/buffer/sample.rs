//! Inbound samples and outbound data points.

use crate::core::Timestamp;
use std::fmt;

/// A raw metric value as handed to the buffer.
///
/// Text values come from the line protocol or loosely typed callers and are
/// converted with [`MetricValue::to_f64`], which never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Already numeric
    Number(f64),
    /// Numeric text, parsed on merge
    Text(String),
}

impl MetricValue {
    /// Convert to `f64`, contributing `0.0` for anything unparseable.
    pub fn to_f64(&self) -> f64 {
        match self {
            MetricValue::Number(value) => *value,
            MetricValue::Text(text) => parse_or_zero(text),
        }
    }
}

/// Parse a decimal number, falling back to zero on failure or non-finite input.
pub fn parse_or_zero(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Number(f64::from(value))
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Number(f64::from(value))
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Number(f64::from(value))
    }
}

impl From<i64> for MetricValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<u64> for MetricValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// One structured ingestion: a timestamp and the metrics observed at it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// When the metrics were observed
    pub time: Timestamp,
    /// Metric key / value pairs, applied in order
    pub metrics: Vec<(String, MetricValue)>,
}

impl Sample {
    /// Start an empty sample at `time`.
    pub fn new(time: impl Into<Timestamp>) -> Self {
        Self {
            time: time.into(),
            metrics: Vec::new(),
        }
    }

    /// Start an empty sample stamped with the current time.
    pub fn now() -> Self {
        Self::new(Timestamp::now())
    }

    /// Add a metric to the sample.
    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.push((key.into(), value.into()));
        self
    }

    /// True when the sample carries no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Number of metrics in the sample.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }
}

/// An aggregated value ready to be shipped downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Metric key
    pub key: String,
    /// Sum of every contribution to this key in this slice
    pub value: f64,
    /// Start of the time slice, in epoch seconds
    pub slice: i64,
}

impl DataPoint {
    /// Create a data point.
    pub fn new(key: impl Into<String>, value: f64, slice: i64) -> Self {
        Self {
            key: key.into(),
            value,
            slice,
        }
    }
}

/// Plaintext wire form: `key value slice`.
impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.value, self.slice)
    }
}

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// A single typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
}

impl fmt::Display for FieldValue {
    /// Line-protocol style rendering: integers carry an `i` suffix, strings
    /// are quoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}i"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "\"{}\"", v.replace('"', "\\\"")),
        }
    }
}

/// One finished metric record: the engine's only output type.
///
/// Keys are unique within a metric; collisions during extraction are
/// resolved last-write-wins in selector declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Metric {
    /// Renders `measurement,tag=v field=v <unix-nanos>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.measurement)?;
        for (key, value) in &self.tags {
            write!(f, ",{key}={value}")?;
        }
        let mut first = true;
        for (key, value) in &self.fields {
            write!(f, "{}{key}={value}", if first { " " } else { "," })?;
            first = false;
        }
        write!(f, " {}", self.timestamp.timestamp_nanos_opt().unwrap_or_default())
    }
}

/// Sink for finished metrics. The engine pushes metrics in production order;
/// the host agent's buffering and delivery live behind this seam.
pub trait Accumulator {
    fn add_metric(&mut self, metric: Metric);
}

impl Accumulator for Vec<Metric> {
    fn add_metric(&mut self, metric: Metric) {
        self.push(metric);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Float(1.5).to_string(), "1.5");
        assert_eq!(FieldValue::Int(42).to_string(), "42i");
        assert_eq!(FieldValue::Bool(true).to_string(), "true");
        assert_eq!(FieldValue::String("up".to_string()).to_string(), "\"up\"");
    }

    #[test]
    fn test_metric_display() {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_string(), "web1".to_string());
        let mut fields = BTreeMap::new();
        fields.insert("cpu".to_string(), FieldValue::Float(0.5));

        let metric = Metric {
            measurement: "system".to_string(),
            tags,
            fields,
            timestamp: DateTime::from_timestamp(1, 0).unwrap(),
        };

        assert_eq!(metric.to_string(), "system,host=web1 cpu=0.5 1000000000");
    }

    #[test]
    fn test_vec_accumulator_preserves_order() {
        let mut sink: Vec<Metric> = Vec::new();
        for name in ["a", "b"] {
            sink.add_metric(Metric {
                measurement: name.to_string(),
                tags: BTreeMap::new(),
                fields: BTreeMap::new(),
                timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            });
        }
        assert_eq!(sink[0].measurement, "a");
        assert_eq!(sink[1].measurement, "b");
    }
}

//! JSON scalar to field-value coercion.
//!
//! Without an explicit directive the JSON kind decides: numbers stay
//! floating point (integral values are never narrowed), strings stay
//! strings, booleans stay booleans and nulls are omitted. A `type`
//! directive forces conversion from the literal instead.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::metric::FieldValue;

/// Explicit target type for a field selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    String,
    Bool,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Bool => "bool",
        })
    }
}

/// Infer a field value from the JSON kind of a matched scalar. `None` means
/// the field is omitted (null, or a composite handled by flattening).
pub(crate) fn infer_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FieldValue::Float),
        Value::String(s) => Some(FieldValue::String(s.clone())),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Convert a matched value into `target`. Null stays omitted; an impossible
/// conversion reports the offending literal.
pub(crate) fn coerce_field(
    key: &str,
    value: &Value,
    target: FieldType,
) -> Result<Option<FieldValue>, ParseError> {
    if value.is_null() {
        return Ok(None);
    }

    let coerced = match target {
        FieldType::Float => match value {
            Value::Number(n) => n.as_f64().map(FieldValue::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(FieldValue::Float),
            Value::Bool(b) => Some(FieldValue::Float(if *b { 1.0 } else { 0.0 })),
            _ => None,
        },
        FieldType::Int => match value {
            // Floats truncate toward zero, matching integer casts elsewhere.
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(FieldValue::Int),
            Value::String(s) => s.trim().parse::<i64>().ok().map(FieldValue::Int),
            Value::Bool(b) => Some(FieldValue::Int(i64::from(*b))),
            _ => None,
        },
        FieldType::Bool => match value {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" | "1" => Some(FieldValue::Bool(true)),
                "false" | "0" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(FieldValue::Bool(false)),
                Some(1) => Some(FieldValue::Bool(true)),
                _ => None,
            },
            _ => None,
        },
        FieldType::String => canonical_text(value).map(FieldValue::String),
    };

    coerced.map(Some).ok_or_else(|| ParseError::TypeConversion {
        key: key.to_string(),
        value: value.to_string(),
        target,
    })
}

/// Canonical textual form of a matched value, used for tags and string
/// coercion. Null has no text; composites render as compact JSON.
pub(crate) fn canonical_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

use thiserror::Error;

use crate::extract::coerce::FieldType;

/// Fatal initialization failures. A parser that returns one of these never
/// existed; nothing can be parsed until the configuration is fixed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration provided")]
    NoConfigurationProvided,

    /// The config has neither a literal `measurement_name` nor a
    /// `measurement_name_path`.
    #[error("config {index}: unable to derive a measurement name")]
    MissingMeasurementName { index: usize },

    #[error(transparent)]
    PathSyntax(#[from] PathSyntaxError),
}

/// A selector string that does not compile. Raised at initialization, never
/// during a parse call.
#[derive(Debug, Error)]
#[error("invalid path expression {expr:?}: {reason}")]
pub struct PathSyntaxError {
    pub expr: String,
    pub reason: String,
}

/// Per-call failures. These are collected and returned alongside whatever
/// metrics were produced; one bad field or element never aborts the batch.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The whole document is unparsable; the call produces zero metrics.
    #[error("invalid JSON document: {0}")]
    JsonSyntax(#[from] serde_json::Error),

    /// A selector marked `required` matched nothing.
    #[error("required path {path:?} matched nothing")]
    MissingRequiredPath { path: String },

    /// A matched literal cannot satisfy the declared field type.
    #[error("cannot convert {value} to {target} for key {key:?}")]
    TypeConversion {
        key: String,
        value: String,
        target: FieldType,
    },

    /// A matched timestamp literal is unparsable; the metric is dropped.
    #[error("cannot parse timestamp {value:?} with format {format:?}")]
    Timestamp { value: String, format: String },
}

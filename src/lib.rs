//! # Smelt - JSON-to-Metric Extraction
//!
//! A declarative extraction engine for telemetry pipelines: it projects
//! nested JSON documents onto flat metric records (measurement, tags,
//! fields, timestamp) driven entirely by configuration. Arrays fan out
//! into one metric per element, selectors resolve relative to their
//! matched element, and types are coerced explicitly.
//!
//! ## Quick Start
//!
//! ```rust
//! use smelt::{Config, ObjectSpec, Parser};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     measurement_name: Some("net".to_string()),
//!     objects: vec![ObjectSpec {
//!         disable_prepend_keys: true,
//!         ..ObjectSpec::new("interfaces")
//!     }],
//!     ..Config::default()
//! };
//!
//! let parser = Parser::new(vec![config])?;
//! let output = parser.parse(br#"{"interfaces": [{"rx": 10.0}, {"rx": 12.5}]}"#);
//!
//! // one metric per array element, in element order
//! assert_eq!(output.metrics.len(), 2);
//! assert!(output.errors.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Failures inside a document (missing required paths, impossible type
//! conversions, unparsable timestamps) never abort the batch: they are
//! collected in [`ParseOutput::errors`] alongside whatever extracted
//! cleanly.

pub mod error;
pub mod extract;
pub mod metric;

// Re-export commonly used types for convenience
pub use error::{ConfigError, ParseError, PathSyntaxError};
pub use extract::{
    Config, FieldSpec, FieldType, ObjectSpec, ParseOutput, Parser, PathExpr, TagSpec,
    TimestampSpec,
};
pub use metric::{Accumulator, FieldValue, Metric};

/// One-shot convenience: build a parser and run a single document through
/// it. Hosts that parse repeatedly should construct [`Parser`] once and
/// reuse it.
pub fn extract_metrics(configs: Vec<Config>, input: &[u8]) -> Result<ParseOutput, ConfigError> {
    Ok(Parser::new(configs)?.parse(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_extraction() {
        let config = Config {
            measurement_name: Some("m".to_string()),
            objects: vec![ObjectSpec::new("stats")],
            ..Config::default()
        };

        let output = extract_metrics(vec![config], br#"{"stats": {"cpu": 1}}"#).unwrap();
        assert_eq!(output.metrics.len(), 1);
        assert_eq!(output.metrics[0].measurement, "m");
    }

    #[test]
    fn test_one_shot_surfaces_config_errors() {
        assert!(extract_metrics(Vec::new(), b"{}").is_err());
    }
}

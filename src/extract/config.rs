//! Configuration schema for the extraction engine.
//!
//! These types deserialize from any serde format; loading the file itself
//! is the host agent's concern. Everything here is validated and compiled
//! by [`Parser::new`](crate::Parser::new) before the first parse call.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::extract::coerce::FieldType;

/// One extraction configuration: measurement naming, optional top-level
/// shortcuts for non-array documents, and object specifications evaluated
/// in declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Literal measurement name for every metric this config produces.
    pub measurement_name: Option<String>,

    /// Path to derive the measurement name from the document instead.
    pub measurement_name_path: Option<String>,

    /// Document-level timestamp path, applied to every draft that has no
    /// object-level timestamp of its own.
    pub timestamp_path: Option<String>,

    /// Format for `timestamp_path`: a unix variant, `rfc3339` or a
    /// strftime layout. Omitted means auto-detect.
    pub timestamp_format: Option<String>,

    /// Field shortcuts evaluated against the document root.
    pub fields: Vec<FieldSpec>,

    /// Tag shortcuts evaluated against the document root.
    pub tags: Vec<TagSpec>,

    /// Constant tags stamped onto every metric this config produces.
    pub static_tags: BTreeMap<String, String>,

    /// Object specifications, evaluated in order.
    pub objects: Vec<ObjectSpec>,
}

/// Extraction rules for one object or array in the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectSpec {
    /// Path to the node to extract metrics from. An array match fans out
    /// into one metric per element.
    pub path: String,

    /// Treat a missing path as an error instead of a silent skip.
    pub required: bool,

    /// Store only terminal key names instead of joining ancestor keys.
    pub disable_prepend_keys: bool,

    /// Field selectors, relative to each matched element. Empty means
    /// collect every leaf of the element's subtree.
    pub fields: Vec<FieldSpec>,

    /// Tag selectors, relative to each matched element.
    pub tags: Vec<TagSpec>,

    /// Timestamp selector, relative to each matched element.
    pub timestamp: Option<TimestampSpec>,

    /// Nested specifications, resolved relative to each matched element;
    /// their drafts inherit this spec's tags and fields.
    pub objects: Vec<ObjectSpec>,
}

impl ObjectSpec {
    pub fn new(path: impl Into<String>) -> Self {
        ObjectSpec {
            path: path.into(),
            ..ObjectSpec::default()
        }
    }
}

/// Selects one field: where to find it, what to call it, what type it is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    pub path: String,

    /// Store under this name verbatim, skipping key prefixing.
    pub rename: Option<String>,

    /// Explicit type directive; omitted means infer from the JSON kind.
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,

    /// A missing path drops the metric instead of just omitting the field.
    pub required: bool,
}

impl FieldSpec {
    pub fn new(path: impl Into<String>) -> Self {
        FieldSpec {
            path: path.into(),
            ..FieldSpec::default()
        }
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Selects one tag; tag values always render as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TagSpec {
    pub path: String,
    pub rename: Option<String>,
    pub required: bool,
}

impl TagSpec {
    pub fn new(path: impl Into<String>) -> Self {
        TagSpec {
            path: path.into(),
            ..TagSpec::default()
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Timestamp selector for an object specification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimestampSpec {
    pub path: String,
    pub format: Option<String>,
}

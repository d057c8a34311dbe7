//! Configuration-driven extraction of metrics from parsed documents.
//!
//! [`Parser::new`] validates the configuration and compiles every selector
//! into segment instructions; a parse call then walks the document without
//! re-examining configuration text. Per-call failures are collected, never
//! fatal: partial output is always preferred over an empty batch.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::error::{ConfigError, ParseError, PathSyntaxError};
use crate::extract::coerce::{self, FieldType};
use crate::extract::config::{Config, FieldSpec, ObjectSpec, TagSpec, TimestampSpec};
use crate::extract::path::{PathExpr, Segment};
use crate::extract::timestamp;
use crate::metric::{Accumulator, FieldValue, Metric};

const KEY_SEPARATOR: &str = "_";

/// Result of one parse call: whatever extracted cleanly, plus every
/// per-field and per-metric failure encountered along the way.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub metrics: Vec<Metric>,
    pub errors: Vec<ParseError>,
}

/// The extraction engine. Immutable once constructed, so a single instance
/// is safe to share across threads; each call allocates its own working
/// state.
#[derive(Debug)]
pub struct Parser {
    configs: Vec<CompiledConfig>,
}

impl Parser {
    /// Validate and compile the configuration. All selector syntax and
    /// measurement-name problems surface here, before the first document.
    pub fn new(configs: Vec<Config>) -> Result<Self, ConfigError> {
        if configs.is_empty() {
            return Err(ConfigError::NoConfigurationProvided);
        }
        let configs = configs
            .iter()
            .enumerate()
            .map(|(index, config)| compile_config(index, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Parser { configs })
    }

    /// Parse a raw document and extract every configured metric.
    pub fn parse(&self, input: &[u8]) -> ParseOutput {
        match serde_json::from_slice::<Value>(input) {
            Ok(document) => self.parse_document(&document),
            Err(error) => ParseOutput {
                metrics: Vec::new(),
                errors: vec![ParseError::JsonSyntax(error)],
            },
        }
    }

    /// Extract from an already-parsed document.
    pub fn parse_document(&self, document: &Value) -> ParseOutput {
        let mut metrics = Vec::new();
        let errors = self.parse_into(document, &mut metrics);
        ParseOutput { metrics, errors }
    }

    /// Extract into an external accumulator, returning the failures.
    ///
    /// Output order is deterministic: configs in declaration order, object
    /// specs in declaration order, array elements in element order, nested
    /// specs after their parent's metric.
    pub fn parse_into<A: Accumulator>(
        &self,
        document: &Value,
        accumulator: &mut A,
    ) -> Vec<ParseError> {
        let mut errors = Vec::new();
        for config in &self.configs {
            config.extract(document, accumulator, &mut errors);
        }
        errors
    }
}

#[derive(Debug)]
enum MeasurementSource {
    Literal(String),
    Path(PathExpr),
}

#[derive(Debug)]
struct CompiledField {
    path: PathExpr,
    rename: Option<String>,
    ty: Option<FieldType>,
    required: bool,
}

impl CompiledField {
    fn coerced(&self, key: &str, node: &Value) -> Result<Option<FieldValue>, ParseError> {
        match self.ty {
            Some(ty) => coerce::coerce_field(key, node, ty),
            None => Ok(coerce::infer_field(node)),
        }
    }
}

#[derive(Debug)]
struct CompiledTag {
    path: PathExpr,
    rename: Option<String>,
    required: bool,
}

#[derive(Debug)]
struct CompiledTimestamp {
    path: PathExpr,
    format: Option<String>,
}

#[derive(Debug)]
struct CompiledObject {
    path: PathExpr,
    required: bool,
    prepend_keys: bool,
    fields: Vec<CompiledField>,
    tags: Vec<CompiledTag>,
    timestamp: Option<CompiledTimestamp>,
    children: Vec<CompiledObject>,
}

#[derive(Debug)]
struct CompiledConfig {
    measurement: MeasurementSource,
    timestamp: Option<CompiledTimestamp>,
    fields: Vec<CompiledField>,
    tags: Vec<CompiledTag>,
    static_tags: BTreeMap<String, String>,
    objects: Vec<CompiledObject>,
}

fn compile_config(index: usize, config: &Config) -> Result<CompiledConfig, ConfigError> {
    let measurement = match (&config.measurement_name, &config.measurement_name_path) {
        (Some(name), _) if !name.is_empty() => MeasurementSource::Literal(name.clone()),
        (_, Some(path)) if !path.is_empty() => MeasurementSource::Path(PathExpr::compile(path)?),
        _ => return Err(ConfigError::MissingMeasurementName { index }),
    };

    let timestamp = match config.timestamp_path.as_deref() {
        Some(path) if !path.is_empty() => Some(CompiledTimestamp {
            path: PathExpr::compile(path)?,
            format: config.timestamp_format.clone(),
        }),
        _ => None,
    };

    let fields = config
        .fields
        .iter()
        .map(compile_field)
        .collect::<Result<Vec<_>, _>>()?;
    let tags = config
        .tags
        .iter()
        .map(compile_tag)
        .collect::<Result<Vec<_>, _>>()?;
    let objects = config
        .objects
        .iter()
        .map(compile_object)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledConfig {
        measurement,
        timestamp,
        fields,
        tags,
        static_tags: config.static_tags.clone(),
        objects,
    })
}

fn compile_object(spec: &ObjectSpec) -> Result<CompiledObject, PathSyntaxError> {
    Ok(CompiledObject {
        path: PathExpr::compile(&spec.path)?,
        required: spec.required,
        prepend_keys: !spec.disable_prepend_keys,
        fields: spec
            .fields
            .iter()
            .map(compile_field)
            .collect::<Result<Vec<_>, _>>()?,
        tags: spec
            .tags
            .iter()
            .map(compile_tag)
            .collect::<Result<Vec<_>, _>>()?,
        timestamp: spec.timestamp.as_ref().map(compile_timestamp).transpose()?,
        children: spec
            .objects
            .iter()
            .map(compile_object)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn compile_field(spec: &FieldSpec) -> Result<CompiledField, PathSyntaxError> {
    Ok(CompiledField {
        path: PathExpr::compile(&spec.path)?,
        rename: spec.rename.clone(),
        ty: spec.field_type,
        required: spec.required,
    })
}

fn compile_tag(spec: &TagSpec) -> Result<CompiledTag, PathSyntaxError> {
    Ok(CompiledTag {
        path: PathExpr::compile(&spec.path)?,
        rename: spec.rename.clone(),
        required: spec.required,
    })
}

fn compile_timestamp(spec: &TimestampSpec) -> Result<CompiledTimestamp, PathSyntaxError> {
    Ok(CompiledTimestamp {
        path: PathExpr::compile(&spec.path)?,
        format: spec.format.clone(),
    })
}

/// Transient per-element accumulator; exists only inside one parse call.
#[derive(Debug, Clone)]
struct Draft {
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<DateTime<Utc>>,
}

impl Draft {
    /// Drafts without a configured timestamp get wall-clock time here.
    fn finish(&self, measurement: &str) -> Metric {
        Metric {
            measurement: measurement.to_string(),
            tags: self.tags.clone(),
            fields: self.fields.clone(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

impl CompiledConfig {
    fn extract<A: Accumulator>(
        &self,
        document: &Value,
        accumulator: &mut A,
        errors: &mut Vec<ParseError>,
    ) {
        let measurement = match self.measurement_name(document, errors) {
            Some(name) => name,
            None => return,
        };

        // Document-level timestamp, shared by every draft of this config
        // that has no object-level timestamp of its own.
        let base_timestamp = match &self.timestamp {
            None => None,
            Some(spec) => match spec.path.resolve_first(document) {
                None => {
                    debug!("timestamp path {:?} matched nothing", spec.path.raw());
                    None
                }
                Some(node) => match timestamp::parse_timestamp(node, spec.format.as_deref()) {
                    Ok(parsed) => Some(parsed),
                    Err(error) => {
                        errors.push(error);
                        return;
                    }
                },
            },
        };

        let base = Draft {
            tags: self.static_tags.clone(),
            fields: BTreeMap::new(),
            timestamp: base_timestamp,
        };

        // Top-level shortcuts form a single draft over the document root.
        if !self.fields.is_empty() || !self.tags.is_empty() {
            let mut draft = base.clone();
            let ok = populate_draft(
                &mut draft,
                document,
                &self.fields,
                &self.tags,
                None,
                true,
                false,
                errors,
            );
            if ok && !draft.fields.is_empty() {
                accumulator.add_metric(draft.finish(&measurement));
            }
        }

        for object in &self.objects {
            object.extract(document, &base, &measurement, accumulator, errors);
        }
    }

    fn measurement_name(&self, document: &Value, errors: &mut Vec<ParseError>) -> Option<String> {
        match &self.measurement {
            MeasurementSource::Literal(name) => Some(name.clone()),
            MeasurementSource::Path(path) => {
                match path.resolve_first(document).and_then(coerce::canonical_text) {
                    Some(name) => Some(name),
                    None => {
                        errors.push(ParseError::MissingRequiredPath {
                            path: path.raw().to_string(),
                        });
                        None
                    }
                }
            }
        }
    }
}

impl CompiledObject {
    fn extract<A: Accumulator>(
        &self,
        context: &Value,
        base: &Draft,
        measurement: &str,
        accumulator: &mut A,
        errors: &mut Vec<ParseError>,
    ) {
        let matches = self.path.resolve(context);
        if matches.is_empty() {
            if self.required {
                errors.push(ParseError::MissingRequiredPath {
                    path: self.path.raw().to_string(),
                });
            } else {
                debug!("object path {:?} matched nothing; skipping", self.path.raw());
            }
            return;
        }

        for matched in matches {
            match matched {
                // An array match fans out: one draft per element, each
                // seeing only its own subtree.
                Value::Array(elements) => {
                    for element in elements {
                        self.extract_element(element, base, measurement, accumulator, errors);
                    }
                }
                other => self.extract_element(other, base, measurement, accumulator, errors),
            }
        }
    }

    fn extract_element<A: Accumulator>(
        &self,
        element: &Value,
        base: &Draft,
        measurement: &str,
        accumulator: &mut A,
        errors: &mut Vec<ParseError>,
    ) {
        let mut draft = base.clone();
        let ok = populate_draft(
            &mut draft,
            element,
            &self.fields,
            &self.tags,
            self.timestamp.as_ref(),
            self.prepend_keys,
            self.fields.is_empty(),
            errors,
        );
        if !ok {
            return;
        }

        if !draft.fields.is_empty() {
            accumulator.add_metric(draft.finish(measurement));
        }

        // Nested specs resolve relative to this element and build on a
        // clone of this draft, so sibling fan-outs never share state.
        for child in &self.children {
            child.extract(element, &draft, measurement, accumulator, errors);
        }
    }
}

/// Evaluate tag, field and timestamp selectors against one context node.
/// Returns false when the draft must be dropped.
#[allow(clippy::too_many_arguments)]
fn populate_draft(
    draft: &mut Draft,
    context: &Value,
    fields: &[CompiledField],
    tags: &[CompiledTag],
    timestamp: Option<&CompiledTimestamp>,
    prepend: bool,
    implicit_fields: bool,
    errors: &mut Vec<ParseError>,
) -> bool {
    // Names claimed by tag and timestamp selectors are excluded from
    // implicit field collection.
    let mut claimed: HashSet<String> = HashSet::new();
    if let Some(spec) = timestamp {
        claimed.insert(selector_name(&spec.path, None, prepend));
    }

    for tag in tags {
        let matches = tag.path.resolve(context);
        if matches.is_empty() {
            if tag.required {
                errors.push(ParseError::MissingRequiredPath {
                    path: tag.path.raw().to_string(),
                });
                return false;
            }
            debug!("tag path {:?} matched nothing; skipping", tag.path.raw());
            continue;
        }
        let natural = selector_name(&tag.path, None, prepend);
        let name = tag.rename.clone().unwrap_or_else(|| natural.clone());
        claimed.insert(natural);
        for node in matches {
            if let Some(text) = coerce::canonical_text(node) {
                draft.tags.insert(name.clone(), text);
            }
        }
    }

    if implicit_fields {
        flatten_fields(draft, &claimed, context, "", prepend);
    }

    for field in fields {
        let matches = field.path.resolve(context);
        if matches.is_empty() {
            if field.required {
                errors.push(ParseError::MissingRequiredPath {
                    path: field.path.raw().to_string(),
                });
                return false;
            }
            debug!("field path {:?} matched nothing; skipping", field.path.raw());
            continue;
        }
        let name = selector_name(&field.path, field.rename.as_deref(), prepend);
        for node in matches {
            match node {
                // Untyped composite match: flatten beneath the selector's
                // name instead of storing a single value.
                Value::Object(_) | Value::Array(_) if field.ty.is_none() => {
                    let prefix = if prepend { name.clone() } else { String::new() };
                    flatten_fields(draft, &claimed, node, &prefix, prepend);
                }
                _ => match field.coerced(&name, node) {
                    Ok(Some(value)) => {
                        draft.fields.insert(name.clone(), value);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        errors.push(error);
                        if field.required {
                            return false;
                        }
                    }
                },
            }
        }
    }

    if let Some(spec) = timestamp {
        match spec.path.resolve_first(context) {
            Some(node) => match timestamp::parse_timestamp(node, spec.format.as_deref()) {
                Ok(parsed) => draft.timestamp = Some(parsed),
                Err(error) => {
                    errors.push(error);
                    return false;
                }
            },
            None => debug!("timestamp path {:?} matched nothing", spec.path.raw()),
        }
    }

    true
}

/// Stored key for a selector match: explicit rename verbatim, otherwise the
/// terminal segment, ancestor-joined when prepending is on. Wildcards never
/// contribute to names.
fn selector_name(path: &PathExpr, rename: Option<&str>, prepend: bool) -> String {
    if let Some(name) = rename {
        return name.to_string();
    }
    let labels: Vec<String> = path
        .segments()
        .iter()
        .filter_map(|segment| match segment {
            Segment::Key(key) => Some(key.clone()),
            Segment::Index(index) => Some(index.to_string()),
            Segment::Wildcard => None,
        })
        .collect();
    match labels.split_last() {
        None => "value".to_string(),
        Some((terminal, ancestors)) => {
            if prepend && !ancestors.is_empty() {
                labels.join(KEY_SEPARATOR)
            } else {
                terminal.clone()
            }
        }
    }
}

/// Walk a subtree, storing every scalar leaf as a field. `prefix` carries
/// the joined ancestor labels and stays empty when prepending is off.
fn flatten_fields(
    draft: &mut Draft,
    claimed: &HashSet<String>,
    node: &Value,
    prefix: &str,
    prepend: bool,
) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_child(draft, claimed, child, prefix, key, prepend);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_child(draft, claimed, child, prefix, &index.to_string(), prepend);
            }
        }
        _ => {}
    }
}

fn flatten_child(
    draft: &mut Draft,
    claimed: &HashSet<String>,
    child: &Value,
    prefix: &str,
    label: &str,
    prepend: bool,
) {
    match child {
        Value::Object(_) => {
            let next = if prepend { join_key(prefix, label) } else { String::new() };
            flatten_fields(draft, claimed, child, &next, prepend);
        }
        Value::Array(items) => {
            // Array elements keep their parent's label joined with the
            // index, so sibling elements never collide.
            for (index, item) in items.iter().enumerate() {
                let composite = format!("{label}{KEY_SEPARATOR}{index}");
                flatten_child(draft, claimed, item, prefix, &composite, prepend);
            }
        }
        scalar => {
            let name = if prepend {
                join_key(prefix, label)
            } else {
                label.to_string()
            };
            if claimed.contains(&name) {
                return;
            }
            if let Some(value) = coerce::infer_field(scalar) {
                draft.fields.insert(name, value);
            }
        }
    }
}

fn join_key(prefix: &str, label: &str) -> String {
    if prefix.is_empty() {
        label.to_string()
    } else {
        format!("{prefix}{KEY_SEPARATOR}{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::config::{FieldSpec, TagSpec, TimestampSpec};
    use serde_json::json;

    fn single_object(measurement: &str, object: ObjectSpec) -> Vec<Config> {
        vec![Config {
            measurement_name: Some(measurement.to_string()),
            objects: vec![object],
            ..Config::default()
        }]
    }

    fn parse(configs: Vec<Config>, document: Value) -> ParseOutput {
        let parser = Parser::new(configs).unwrap();
        parser.parse_document(&document)
    }

    #[test]
    fn test_empty_config_list_fails_init() {
        let err = Parser::new(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no configuration provided"));
    }

    #[test]
    fn test_missing_measurement_name_fails_init() {
        let err = Parser::new(vec![Config::default()]).unwrap_err();
        assert!(err.to_string().contains("measurement name"));
    }

    #[test]
    fn test_malformed_selector_fails_init() {
        let configs = single_object("m", ObjectSpec::new("a..b"));
        let err = Parser::new(configs).unwrap_err();
        assert!(matches!(err, ConfigError::PathSyntax(_)));
    }

    #[test]
    fn test_invalid_json_yields_syntax_error_and_no_metrics() {
        let parser = Parser::new(single_object("m", ObjectSpec::new("a"))).unwrap();
        let output = parser.parse(b"{not json");
        assert!(output.metrics.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(matches!(output.errors[0], ParseError::JsonSyntax(_)));
    }

    #[test]
    fn test_array_fan_out_in_element_order() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            ..ObjectSpec::new("metrics")
        };
        let output = parse(
            single_object("m", object),
            json!({"metrics": [{"cpu": 1}, {"cpu": 2}]}),
        );

        assert!(output.errors.is_empty());
        assert_eq!(output.metrics.len(), 2);
        assert_eq!(output.metrics[0].fields["cpu"], FieldValue::Float(1.0));
        assert_eq!(output.metrics[1].fields["cpu"], FieldValue::Float(2.0));
    }

    #[test]
    fn test_fan_out_isolates_sibling_elements() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            tags: vec![TagSpec::new("name")],
            ..ObjectSpec::new("disks")
        };
        let output = parse(
            single_object("disk", object),
            json!({"disks": [
                {"name": "sda", "free": 100},
                {"name": "sdb", "used": 7}
            ]}),
        );

        assert_eq!(output.metrics.len(), 2);
        assert_eq!(output.metrics[0].tags["name"], "sda");
        assert!(output.metrics[0].fields.contains_key("free"));
        assert!(!output.metrics[0].fields.contains_key("used"));
        assert_eq!(output.metrics[1].tags["name"], "sdb");
        assert!(!output.metrics[1].fields.contains_key("free"));
    }

    #[test]
    fn test_prepended_key_naming() {
        let output = parse(
            single_object("m", ObjectSpec::new("metrics")),
            json!({"metrics": {"a": {"cpu": 1}}}),
        );
        assert_eq!(output.metrics.len(), 1);
        assert_eq!(output.metrics[0].fields["a_cpu"], FieldValue::Float(1.0));
    }

    #[test]
    fn test_disabled_prepend_keeps_terminal_name() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            ..ObjectSpec::new("metrics")
        };
        let output = parse(single_object("m", object), json!({"metrics": {"a": {"cpu": 1}}}));
        assert_eq!(output.metrics[0].fields["cpu"], FieldValue::Float(1.0));
        assert!(!output.metrics[0].fields.contains_key("a_cpu"));
    }

    #[test]
    fn test_flattened_arrays_index_their_keys() {
        let output = parse(
            single_object("m", ObjectSpec::new("metrics")),
            json!({"metrics": {"load": [1, 5]}}),
        );
        let fields = &output.metrics[0].fields;
        assert_eq!(fields["load_0"], FieldValue::Float(1.0));
        assert_eq!(fields["load_1"], FieldValue::Float(5.0));
    }

    #[test]
    fn test_missing_intermediate_segment_skips_without_error() {
        let output = parse(
            single_object("m", ObjectSpec::new("a.b.c")),
            json!({"x": 1}),
        );
        assert!(output.metrics.is_empty());
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_required_object_missing_records_error() {
        let object = ObjectSpec {
            required: true,
            ..ObjectSpec::new("a.b.c")
        };
        let output = parse(single_object("m", object), json!({"x": 1}));
        assert!(output.metrics.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(matches!(
            &output.errors[0],
            ParseError::MissingRequiredPath { path } if path == "a.b.c"
        ));
    }

    #[test]
    fn test_typed_int_from_string() {
        let object = ObjectSpec {
            fields: vec![FieldSpec::new("count").typed(FieldType::Int)],
            ..ObjectSpec::new("stats")
        };
        let output = parse(single_object("m", object), json!({"stats": {"count": "42"}}));
        assert_eq!(output.metrics[0].fields["count"], FieldValue::Int(42));
    }

    #[test]
    fn test_conversion_error_on_optional_field_keeps_metric() {
        let object = ObjectSpec {
            fields: vec![
                FieldSpec::new("count").typed(FieldType::Int),
                FieldSpec::new("cpu"),
            ],
            ..ObjectSpec::new("stats")
        };
        let output = parse(
            single_object("m", object),
            json!({"stats": {"count": "abc", "cpu": 1}}),
        );

        assert_eq!(output.metrics.len(), 1);
        assert!(!output.metrics[0].fields.contains_key("count"));
        assert_eq!(output.metrics[0].fields["cpu"], FieldValue::Float(1.0));
        assert_eq!(output.errors.len(), 1);
        assert!(matches!(output.errors[0], ParseError::TypeConversion { .. }));
    }

    #[test]
    fn test_conversion_error_on_required_field_drops_metric() {
        let object = ObjectSpec {
            fields: vec![
                FieldSpec::new("count").typed(FieldType::Int).required(),
                FieldSpec::new("cpu"),
            ],
            ..ObjectSpec::new("stats")
        };
        let output = parse(
            single_object("m", object),
            json!({"stats": {"count": "abc", "cpu": 1}}),
        );

        assert!(output.metrics.is_empty());
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_field_rename_is_verbatim() {
        let object = ObjectSpec {
            fields: vec![FieldSpec::new("deep.rx_bytes").renamed("rx")],
            ..ObjectSpec::new("iface")
        };
        let output = parse(
            single_object("m", object),
            json!({"iface": {"deep": {"rx_bytes": 9}}}),
        );
        assert_eq!(output.metrics[0].fields["rx"], FieldValue::Float(9.0));
    }

    #[test]
    fn test_field_selector_name_joins_its_own_segments() {
        let object = ObjectSpec {
            fields: vec![FieldSpec::new("deep.rx_bytes")],
            ..ObjectSpec::new("iface")
        };
        let output = parse(
            single_object("m", object),
            json!({"iface": {"deep": {"rx_bytes": 9}}}),
        );
        assert_eq!(
            output.metrics[0].fields["deep_rx_bytes"],
            FieldValue::Float(9.0)
        );
    }

    #[test]
    fn test_tag_leaves_are_excluded_from_implicit_fields() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            tags: vec![TagSpec::new("name")],
            ..ObjectSpec::new("disks")
        };
        let output = parse(
            single_object("m", object),
            json!({"disks": {"name": "sda", "free": 5}}),
        );
        let metric = &output.metrics[0];
        assert_eq!(metric.tags["name"], "sda");
        assert!(!metric.fields.contains_key("name"));
        assert_eq!(metric.fields["free"], FieldValue::Float(5.0));
    }

    #[test]
    fn test_tag_values_render_canonical_text() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            tags: vec![TagSpec::new("code"), TagSpec::new("up").renamed("alive")],
            ..ObjectSpec::new("svc")
        };
        let output = parse(
            single_object("m", object),
            json!({"svc": {"code": 200, "up": true, "latency": 3}}),
        );
        let metric = &output.metrics[0];
        assert_eq!(metric.tags["code"], "200");
        assert_eq!(metric.tags["alive"], "true");
    }

    #[test]
    fn test_object_timestamp_selector() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            timestamp: Some(TimestampSpec {
                path: "time".to_string(),
                format: Some("unix".to_string()),
            }),
            ..ObjectSpec::new("stats")
        };
        let output = parse(
            single_object("m", object),
            json!({"stats": {"cpu": 1, "time": 1609459200}}),
        );
        let metric = &output.metrics[0];
        assert_eq!(metric.timestamp.timestamp(), 1609459200);
        // the timestamp leaf is not also a field
        assert!(!metric.fields.contains_key("time"));
        assert!(metric.fields.contains_key("cpu"));
    }

    #[test]
    fn test_unparsable_timestamp_drops_metric() {
        let object = ObjectSpec {
            timestamp: Some(TimestampSpec {
                path: "time".to_string(),
                format: Some("rfc3339".to_string()),
            }),
            ..ObjectSpec::new("stats")
        };
        let output = parse(
            single_object("m", object),
            json!({"stats": {"cpu": 1, "time": "yesterday-ish"}}),
        );
        assert!(output.metrics.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(matches!(output.errors[0], ParseError::Timestamp { .. }));
    }

    #[test]
    fn test_config_level_timestamp_applies_to_drafts() {
        let configs = vec![Config {
            measurement_name: Some("m".to_string()),
            timestamp_path: Some("taken_at".to_string()),
            timestamp_format: Some("rfc3339".to_string()),
            objects: vec![ObjectSpec {
                disable_prepend_keys: true,
                ..ObjectSpec::new("rows")
            }],
            ..Config::default()
        }];
        let output = parse(
            configs,
            json!({"taken_at": "2021-01-01T00:00:00Z", "rows": [{"v": 1}, {"v": 2}]}),
        );
        assert_eq!(output.metrics.len(), 2);
        for metric in &output.metrics {
            assert_eq!(metric.timestamp.timestamp(), 1609459200);
        }
    }

    #[test]
    fn test_reparse_is_deterministic_except_wall_clock() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            tags: vec![TagSpec::new("name")],
            ..ObjectSpec::new("rows")
        };
        let parser = Parser::new(single_object("m", object)).unwrap();
        let doc = json!({"rows": [{"name": "a", "v": 1}]});

        let first = parser.parse_document(&doc);
        let second = parser.parse_document(&doc);
        assert_eq!(first.metrics[0].measurement, second.metrics[0].measurement);
        assert_eq!(first.metrics[0].tags, second.metrics[0].tags);
        assert_eq!(first.metrics[0].fields, second.metrics[0].fields);
    }

    #[test]
    fn test_measurement_name_from_path() {
        let configs = vec![Config {
            measurement_name_path: Some("meta.name".to_string()),
            objects: vec![ObjectSpec::new("stats")],
            ..Config::default()
        }];
        let output = parse(
            configs,
            json!({"meta": {"name": "widget"}, "stats": {"cpu": 1}}),
        );
        assert_eq!(output.metrics[0].measurement, "widget");
    }

    #[test]
    fn test_unresolvable_measurement_path_skips_config() {
        let configs = vec![Config {
            measurement_name_path: Some("meta.name".to_string()),
            objects: vec![ObjectSpec::new("stats")],
            ..Config::default()
        }];
        let output = parse(configs, json!({"stats": {"cpu": 1}}));
        assert!(output.metrics.is_empty());
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_static_tags_stamped_on_every_metric() {
        let configs = vec![Config {
            measurement_name: Some("m".to_string()),
            static_tags: [("dc".to_string(), "eu-1".to_string())].into(),
            objects: vec![ObjectSpec {
                disable_prepend_keys: true,
                ..ObjectSpec::new("rows")
            }],
            ..Config::default()
        }];
        let output = parse(configs, json!({"rows": [{"v": 1}, {"v": 2}]}));
        assert_eq!(output.metrics.len(), 2);
        for metric in &output.metrics {
            assert_eq!(metric.tags["dc"], "eu-1");
        }
    }

    #[test]
    fn test_top_level_shortcuts_precede_objects() {
        let configs = vec![Config {
            measurement_name: Some("m".to_string()),
            fields: vec![FieldSpec::new("uptime").typed(FieldType::Int)],
            objects: vec![ObjectSpec {
                disable_prepend_keys: true,
                ..ObjectSpec::new("rows")
            }],
            ..Config::default()
        }];
        let output = parse(configs, json!({"uptime": 99, "rows": [{"v": 1}]}));

        assert_eq!(output.metrics.len(), 2);
        assert_eq!(output.metrics[0].fields["uptime"], FieldValue::Int(99));
        assert_eq!(output.metrics[1].fields["v"], FieldValue::Float(1.0));
    }

    #[test]
    fn test_configs_processed_in_declaration_order() {
        let configs = vec![
            Config {
                measurement_name: Some("first".to_string()),
                objects: vec![ObjectSpec::new("a")],
                ..Config::default()
            },
            Config {
                measurement_name: Some("second".to_string()),
                objects: vec![ObjectSpec::new("a")],
                ..Config::default()
            },
        ];
        let output = parse(configs, json!({"a": {"v": 1}}));
        assert_eq!(output.metrics[0].measurement, "first");
        assert_eq!(output.metrics[1].measurement, "second");
    }

    #[test]
    fn test_wildcard_path_fans_out_one_level_deeper() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            ..ObjectSpec::new("servers.*.disks")
        };
        let output = parse(
            single_object("disk", object),
            json!({"servers": [
                {"disks": [{"free": 1}, {"free": 2}]},
                {"disks": [{"free": 3}]}
            ]}),
        );
        assert_eq!(output.metrics.len(), 3);
        let frees: Vec<_> = output
            .metrics
            .iter()
            .map(|m| m.fields["free"].clone())
            .collect();
        assert_eq!(
            frees,
            vec![
                FieldValue::Float(1.0),
                FieldValue::Float(2.0),
                FieldValue::Float(3.0)
            ]
        );
    }

    #[test]
    fn test_nested_objects_inherit_parent_draft() {
        let object = ObjectSpec {
            disable_prepend_keys: true,
            tags: vec![TagSpec::new("host")],
            fields: vec![FieldSpec::new("cpu")],
            objects: vec![ObjectSpec {
                disable_prepend_keys: true,
                ..ObjectSpec::new("disks")
            }],
            ..ObjectSpec::new("servers")
        };
        let output = parse(
            single_object("m", object),
            json!({"servers": [{
                "host": "web1",
                "cpu": 0.5,
                "disks": [{"free": 10}, {"free": 20}]
            }]}),
        );

        // parent metric first, then one per disk
        assert_eq!(output.metrics.len(), 3);
        assert_eq!(output.metrics[0].fields["cpu"], FieldValue::Float(0.5));
        for disk in &output.metrics[1..] {
            assert_eq!(disk.tags["host"], "web1");
            assert_eq!(disk.fields["cpu"], FieldValue::Float(0.5));
        }
        assert_eq!(output.metrics[1].fields["free"], FieldValue::Float(10.0));
        assert_eq!(output.metrics[2].fields["free"], FieldValue::Float(20.0));
        // sibling drafts stay isolated
        assert!(!output.metrics[1].fields.contains_key("free_1"));
    }

    #[test]
    fn test_draft_with_no_fields_is_not_emitted() {
        let object = ObjectSpec {
            fields: vec![FieldSpec::new("absent")],
            ..ObjectSpec::new("stats")
        };
        let output = parse(single_object("m", object), json!({"stats": {"x": 1}}));
        assert!(output.metrics.is_empty());
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_parse_into_external_accumulator() {
        let parser = Parser::new(single_object(
            "m",
            ObjectSpec {
                disable_prepend_keys: true,
                ..ObjectSpec::new("rows")
            },
        ))
        .unwrap();

        let mut sink: Vec<Metric> = Vec::new();
        let errors = parser.parse_into(&json!({"rows": [{"v": 1}]}), &mut sink);
        assert!(errors.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_parser_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Parser>();
    }
}

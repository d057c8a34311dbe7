//! Compiled path expressions over parsed JSON documents.
//!
//! Selector strings compile once, at parser construction, into a flat list
//! of segment instructions. A parse call then resolves pre-compiled
//! segments against the document tree without re-examining configuration
//! text.

use serde_json::Value;

use crate::error::PathSyntaxError;

/// One step of a compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Named member of an object.
    Key(String),
    /// Array element by position; on an object, falls back to the member
    /// whose name is the decimal literal.
    Index(usize),
    /// Every element of an array.
    Wildcard,
}

/// A compiled selector locating zero, one or many nodes relative to a
/// context node.
#[derive(Debug, Clone)]
pub struct PathExpr {
    raw: String,
    segments: Vec<Segment>,
}

impl PathExpr {
    /// Compile a dot-separated path expression. `*` expands arrays, an
    /// all-digit segment indexes them; everything else is a key lookup.
    pub fn compile(expr: &str) -> Result<Self, PathSyntaxError> {
        if expr.is_empty() {
            return Err(PathSyntaxError {
                expr: expr.to_string(),
                reason: "empty expression".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in expr.split('.') {
            if part.is_empty() {
                return Err(PathSyntaxError {
                    expr: expr.to_string(),
                    reason: "empty segment".to_string(),
                });
            }
            let segment = if part == "*" {
                Segment::Wildcard
            } else if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part.parse::<usize>().map_err(|_| PathSyntaxError {
                    expr: expr.to_string(),
                    reason: format!("index segment {part:?} out of range"),
                })?;
                Segment::Index(index)
            } else {
                Segment::Key(part.to_string())
            };
            segments.push(segment);
        }

        Ok(PathExpr {
            raw: expr.to_string(),
            segments,
        })
    }

    /// The expression as written in the configuration.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve against a context node, returning matches in document order.
    ///
    /// A missing key, an out-of-range index or a descent into a scalar
    /// resolves to an empty set, never an error at this layer.
    pub fn resolve<'a>(&self, context: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![context];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                match segment {
                    Segment::Key(name) => {
                        if let Value::Object(map) = node {
                            if let Some(child) = map.get(name) {
                                next.push(child);
                            }
                        }
                    }
                    Segment::Index(index) => match node {
                        Value::Array(items) => {
                            if let Some(child) = items.get(*index) {
                                next.push(child);
                            }
                        }
                        Value::Object(map) => {
                            if let Some(child) = map.get(&index.to_string()) {
                                next.push(child);
                            }
                        }
                        _ => {}
                    },
                    Segment::Wildcard => {
                        if let Value::Array(items) = node {
                            next.extend(items.iter());
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Single-match convenience: the first resolved node, if any.
    pub fn resolve_first<'a>(&self, context: &'a Value) -> Option<&'a Value> {
        self.resolve(context).into_iter().next()
    }
}

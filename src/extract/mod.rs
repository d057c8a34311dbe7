//! Configuration-driven metric extraction from JSON documents.
//!
//! Selectors compile once at parser construction; every parse call after
//! that resolves pre-compiled segments against the document tree, so the
//! hot path never re-parses configuration text.

pub mod coerce;
pub mod config;
pub mod parser;
pub mod path;
pub mod timestamp;

pub use coerce::FieldType;
pub use config::{Config, FieldSpec, ObjectSpec, TagSpec, TimestampSpec};
pub use parser::{ParseOutput, Parser};
pub use path::PathExpr;

//! Raw schema-schema records and the adapters that produce them.
//!
//! An adapter hands the engine fully materialised records of five kinds.
//! The engine never sees the storage form they came from.

mod batch;
mod document;
pub mod tables;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::SchemaResult;

pub use batch::RecordBatch;
pub use document::DocumentSource;
pub use tables::{AUDIT_COLUMNS, TableNames, TableRowSource};

/// The five record kinds of the schema-schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Schema,
    Model,
    Column,
    Association,
    Constraint,
}

impl RecordKind {
    /// Fields that must be present and non-null.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Schema => &["schema_name"],
            Self::Model => &["model_name", "schema_name"],
            Self::Column => &["column_name", "schema_name", "type_spec"],
            Self::Association => &[
                "model_name",
                "column_name",
                "schema_name",
                "position",
                "nullable",
                "autoincrement",
            ],
            Self::Constraint => &["constraint_type", "model_name", "schema_name", "columns"],
        }
    }

    /// Fields forming the record's primary key, in key order.
    pub fn key_fields(self) -> &'static [&'static str] {
        match self {
            Self::Schema => &["schema_name"],
            Self::Model => &["schema_name", "model_name"],
            Self::Column => &["schema_name", "column_name"],
            Self::Association => &["schema_name", "model_name", "column_name"],
            Self::Constraint => &[
                "schema_name",
                "model_name",
                "constraint_type",
                "constraint_name",
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Model => "model",
            Self::Column => "column",
            Self::Association => "association",
            Self::Constraint => "constraint",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw record: a kind plus a mapping of field name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub fields: Map<String, JsonValue>,
}

impl RawRecord {
    /// Create an empty record of the given kind.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    /// Set a field.
    pub fn with(mut self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Get a field, treating JSON `null` as absent.
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Get a text field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(JsonValue::as_str)
    }

    /// The schema this record belongs to.
    pub fn schema_name(&self) -> Option<&str> {
        self.get_str("schema_name")
    }

    /// The first required field that is missing or null.
    pub fn missing_field(&self) -> Option<&'static str> {
        self.kind
            .required_fields()
            .iter()
            .copied()
            .find(|field| self.get(field).is_none())
    }

    /// Human-readable primary key, e.g. `Libra.testmodel1.testcolumn1`.
    ///
    /// Missing key parts render as `?`. An unnamed constraint is keyed by
    /// its column list instead of a name, e.g. `Libra.testmodel1.uq[a,b]`.
    pub fn key(&self) -> String {
        let mut parts = Vec::new();
        for field in self.kind.key_fields() {
            match self.get(field) {
                Some(JsonValue::String(s)) => parts.push(s.clone()),
                Some(other) => parts.push(other.to_string()),
                None if *field == "constraint_name" => {}
                None => parts.push("?".to_string()),
            }
        }
        let mut key = parts.join(".");
        if self.kind == RecordKind::Constraint && self.get("constraint_name").is_none() {
            key.push_str(&format!("[{}]", self.column_label()));
        }
        key
    }

    /// Constraint columns as `a,b`, from a JSON list or list-literal text.
    fn column_label(&self) -> String {
        match self.get("columns") {
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Some(JsonValue::String(text)) => text
                .chars()
                .filter(|c| !matches!(c, '[' | ']' | '\'' | '"') && !c.is_whitespace())
                .collect(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Which schemas an adapter should yield.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchemaSelector {
    #[default]
    All,
    Named(String),
}

impl SchemaSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Whether records of `schema` are selected.
    pub fn matches(&self, schema: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => name == schema,
        }
    }
}

/// A producer of raw records.
///
/// Implementations perform any I/O up front; the engine only consumes the
/// returned batch.
pub trait RecordSource {
    /// Yield every record of the selected schema(s).
    fn records(&self, selector: &SchemaSelector) -> SchemaResult<Vec<RawRecord>>;

    /// Short label used in logs.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Keep only records whose schema matches; records lacking a schema name are
/// kept so the builder can report them.
pub(crate) fn select(records: Vec<RawRecord>, selector: &SchemaSelector) -> Vec<RawRecord> {
    records
        .into_iter()
        .filter(|r| r.schema_name().is_none_or(|name| selector.matches(name)))
        .collect()
}

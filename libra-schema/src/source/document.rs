//! Hierarchical document source (YAML, JSON or TOML).
//!
//! The document is a table of schemas:
//!
//! ```text
//! { "<schema>": {
//!     "description": "...",
//!     "columns": { "<column>": { "sa_coltype": "String(30)", "default": "-", ... } },
//!     "models": { "<model>": {
//!         "columns": [ "<column>", { "<column>": { "nullable": false } } ],
//!         "constraints": [ { "pk": ["<column>"] }, { "fk": { "columns": ["c"], "reference": "m.c" } } ]
//!     } }
//! } }
//! ```
//!
//! Association-level keys given on a column definition act as defaults for
//! every model using that column. Entries in a model's column list override
//! them. Position is the index in the list unless given explicitly.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};

use super::{RawRecord, RecordKind, RecordSource, SchemaSelector};

/// Column-definition keys that are really per-association attributes.
const ASSOCIATION_KEYS: &[&str] = &[
    "nullable",
    "null_allowed",
    "autoincrement",
    "quote",
    "onupdate",
    "info",
    "position",
    "column_position",
];

/// Keys folded into an association's `info` map.
const INFO_KEYS: &[&str] = &["regex", "min", "max", "format"];

/// A schema document held in memory.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    document: JsonValue,
}

impl DocumentSource {
    /// Wrap an already-parsed document.
    pub fn from_value(document: JsonValue) -> Self {
        Self { document }
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        let document = serde_json::from_str(text).map_err(|e| SchemaError::JsonError { source: e })?;
        Ok(Self { document })
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        let document = toml::from_str(text).map_err(|e| SchemaError::TomlError { source: e })?;
        Ok(Self { document })
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> SchemaResult<Self> {
        let document =
            serde_yaml::from_str(text).map_err(|e| SchemaError::YamlError { source: e })?;
        Ok(Self { document })
    }

    /// Read a document from disk.
    ///
    /// `.yaml`/`.yml` files are YAML, `.toml` files TOML, anything else JSON.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}

impl RecordSource for DocumentSource {
    fn records(&self, selector: &SchemaSelector) -> SchemaResult<Vec<RawRecord>> {
        let root = self.document.as_object().ok_or_else(|| SchemaError::ConfigError {
            message: "schema document must be a table keyed by schema name".to_string(),
        })?;

        let mut records = Vec::new();
        for (schema_name, body) in root {
            if !selector.matches(schema_name) {
                continue;
            }
            let body = table(body, RecordKind::Schema, schema_name, "<root>")?;
            flatten_schema(schema_name, body, &mut records)?;
        }

        debug!(records = records.len(), "flattened schema document");
        Ok(records)
    }

    fn describe(&self) -> String {
        "schema document".to_string()
    }
}

fn flatten_schema(
    schema: &str,
    body: &Map<String, JsonValue>,
    records: &mut Vec<RawRecord>,
) -> SchemaResult<()> {
    let mut record = RawRecord::new(RecordKind::Schema).with("schema_name", schema);
    for (key, value) in body {
        if key != "columns" && key != "models" {
            record.fields.insert(key.clone(), value.clone());
        }
    }
    records.push(record);

    let mut association_defaults: HashMap<&str, Map<String, JsonValue>> = HashMap::new();
    if let Some(columns) = body.get("columns").filter(|v| !v.is_null()) {
        for (column, def) in table(columns, RecordKind::Schema, schema, "columns")? {
            let key = format!("{}.{}", schema, column);
            let def = table(def, RecordKind::Column, &key, "<definition>")?;

            let mut record = RawRecord::new(RecordKind::Column)
                .with("column_name", column.as_str())
                .with("schema_name", schema);
            let mut defaults = Map::new();
            for (field, value) in def {
                match field.as_str() {
                    "sa_coltype" | "type" => {
                        record.fields.insert("type_spec".into(), value.clone());
                    }
                    "default" => {
                        record.fields.insert("default_val".into(), value.clone());
                    }
                    f if ASSOCIATION_KEYS.contains(&f) || INFO_KEYS.contains(&f) => {
                        fold_association_field(&mut defaults, f, value);
                    }
                    _ => {
                        record.fields.insert(field.clone(), value.clone());
                    }
                }
            }
            records.push(record);
            association_defaults.insert(column.as_str(), defaults);
        }
    }

    if let Some(models) = body.get("models").filter(|v| !v.is_null()) {
        for (model, def) in table(models, RecordKind::Schema, schema, "models")? {
            let key = format!("{}.{}", schema, model);
            let def = table(def, RecordKind::Model, &key, "<definition>")?;

            let mut record = RawRecord::new(RecordKind::Model)
                .with("model_name", model.as_str())
                .with("schema_name", schema);
            for (field, value) in def {
                if field != "columns" && field != "constraints" {
                    record.fields.insert(field.clone(), value.clone());
                }
            }
            records.push(record);

            if let Some(columns) = def.get("columns").filter(|v| !v.is_null()) {
                let columns = columns.as_array().ok_or_else(|| {
                    SchemaError::invalid_field(RecordKind::Model, &key, "columns", "expected a list")
                })?;
                for (index, item) in columns.iter().enumerate() {
                    records.push(association(
                        schema,
                        model,
                        index,
                        item,
                        &association_defaults,
                    )?);
                }
            }

            if let Some(constraints) = def.get("constraints").filter(|v| !v.is_null()) {
                let constraints = constraints.as_array().ok_or_else(|| {
                    SchemaError::invalid_field(
                        RecordKind::Model,
                        &key,
                        "constraints",
                        "expected a list",
                    )
                })?;
                for entry in constraints {
                    let entry = table(entry, RecordKind::Model, &key, "constraints")?;
                    for (kind, spec) in entry {
                        expand_constraint(schema, model, kind, spec, records)?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn association(
    schema: &str,
    model: &str,
    index: usize,
    item: &JsonValue,
    defaults: &HashMap<&str, Map<String, JsonValue>>,
) -> SchemaResult<RawRecord> {
    let entry = match item {
        JsonValue::String(column) => Some((column.as_str(), None)),
        JsonValue::Object(entry) if entry.len() == 1 => entry
            .iter()
            .next()
            .map(|(column, overrides)| (column.as_str(), Some(overrides))),
        _ => None,
    };
    let (column, overrides) = entry.ok_or_else(|| {
        SchemaError::invalid_field(
            RecordKind::Model,
            format!("{}.{}", schema, model),
            "columns",
            "expected a column name or a single-entry table",
        )
    })?;

    let mut record = RawRecord::new(RecordKind::Association)
        .with("model_name", model)
        .with("column_name", column)
        .with("schema_name", schema)
        .with("position", index as u64)
        .with("nullable", true)
        .with("autoincrement", "auto");

    if let Some(defaults) = defaults.get(column) {
        for (field, value) in defaults {
            fold_association_field(&mut record.fields, field, value);
        }
    }

    match overrides {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(overrides)) => {
            for (field, value) in overrides {
                fold_association_field(&mut record.fields, field, value);
            }
        }
        Some(_) => {
            return Err(SchemaError::invalid_field(
                RecordKind::Association,
                record.key(),
                "<overrides>",
                "expected a table",
            ));
        }
    }

    Ok(record)
}

/// Insert an association field, renaming legacy keys and merging `info`.
fn fold_association_field(target: &mut Map<String, JsonValue>, field: &str, value: &JsonValue) {
    match field {
        "null_allowed" => {
            target.insert("nullable".into(), value.clone());
        }
        "column_position" => {
            target.insert("position".into(), value.clone());
        }
        "info" => match (target.get_mut("info"), value) {
            (Some(JsonValue::Object(existing)), JsonValue::Object(extra)) => {
                for (k, v) in extra {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => {
                target.insert("info".into(), value.clone());
            }
        },
        f if INFO_KEYS.contains(&f) => {
            let info = target
                .entry("info")
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !info.is_object() {
                *info = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(info) = info {
                info.insert(f.to_string(), value.clone());
            }
        }
        _ => {
            target.insert(field.to_string(), value.clone());
        }
    }
}

/// Turn one `{kind: spec}` constraint entry into records.
///
/// A list of names is one constraint over those columns; a list of lists or
/// tables is several constraints of the same kind.
fn expand_constraint(
    schema: &str,
    model: &str,
    kind: &str,
    spec: &JsonValue,
    records: &mut Vec<RawRecord>,
) -> SchemaResult<()> {
    let base = RawRecord::new(RecordKind::Constraint)
        .with("constraint_type", kind)
        .with("model_name", model)
        .with("schema_name", schema);

    match spec {
        JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
            records.push(base.with("columns", spec.clone()));
        }
        JsonValue::Array(items) => {
            for item in items {
                expand_constraint(schema, model, kind, item, records)?;
            }
        }
        JsonValue::String(text) if is_check(kind) => {
            records.push(
                base.with("columns", JsonValue::Array(Vec::new()))
                    .with("sqltext", text.as_str()),
            );
        }
        JsonValue::String(column) => {
            records.push(base.with("columns", vec![JsonValue::String(column.clone())]));
        }
        JsonValue::Object(fields) => {
            let mut record = base;
            for (field, value) in fields {
                match field.as_str() {
                    "name" => {
                        record.fields.insert("constraint_name".into(), value.clone());
                    }
                    "column" => {
                        record.fields.insert("columns".into(), JsonValue::Array(vec![value.clone()]));
                    }
                    _ => {
                        record.fields.insert(field.clone(), value.clone());
                    }
                }
            }
            if is_check(kind) && record.get("columns").is_none() {
                record.fields.insert("columns".into(), JsonValue::Array(Vec::new()));
            }
            records.push(record);
        }
        _ => {
            return Err(SchemaError::invalid_field(
                RecordKind::Constraint,
                format!("{}.{}.{}", schema, model, kind),
                "columns",
                "expected a column list or a constraint table",
            ));
        }
    }

    Ok(())
}

fn is_check(kind: &str) -> bool {
    kind.eq_ignore_ascii_case("ck") || kind.eq_ignore_ascii_case("check")
}

fn table<'a>(
    value: &'a JsonValue,
    kind: RecordKind,
    key: &str,
    field: &str,
) -> SchemaResult<&'a Map<String, JsonValue>> {
    value
        .as_object()
        .ok_or_else(|| SchemaError::invalid_field(kind, key, field, "expected a table"))
}

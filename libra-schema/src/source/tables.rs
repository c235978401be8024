//! Rows of the five persisted schema-schema tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::evaluator::DEFAULT_NULL_MARKERS;

use super::{RawRecord, RecordKind, RecordSource, SchemaSelector, select};

/// Bookkeeping columns every persisted table carries.
pub const AUDIT_COLUMNS: &[&str] = &["loadauthor", "loaddate", "modauthor", "moddate"];

/// Names of the persisted schema-schema tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableNames {
    /// Owner of the tables, written as `namespace.table`.
    pub namespace: Option<String>,
    pub schemadescript: String,
    pub modeldescript: String,
    pub columndescript: String,
    pub columnassoc: String,
    pub constraintdescript: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            namespace: None,
            schemadescript: "schemadescript".to_string(),
            modeldescript: "modeldescript".to_string(),
            columndescript: "columndescript".to_string(),
            columnassoc: "columnassoc".to_string(),
            constraintdescript: "constraintdescript".to_string(),
        }
    }
}

impl TableNames {
    /// The record kind stored in `table`, if it is one of ours.
    pub fn kind_of(&self, table: &str) -> Option<RecordKind> {
        [
            (&self.schemadescript, RecordKind::Schema),
            (&self.modeldescript, RecordKind::Model),
            (&self.columndescript, RecordKind::Column),
            (&self.columnassoc, RecordKind::Association),
            (&self.constraintdescript, RecordKind::Constraint),
        ]
        .into_iter()
        .find(|(name, _)| name.as_str() == table)
        .map(|(_, kind)| kind)
    }
}

/// Rows read from the persisted tables.
///
/// Cells equal to a null marker become null. Audit columns are kept on
/// schema rows and dropped elsewhere.
#[derive(Debug, Clone)]
pub struct TableRowSource {
    names: TableNames,
    null_markers: Vec<String>,
    rows: Vec<RawRecord>,
}

impl TableRowSource {
    pub fn new(names: TableNames) -> Self {
        Self {
            names,
            null_markers: DEFAULT_NULL_MARKERS.iter().map(|m| m.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Tables live under `namespace.` (a table owner or database schema).
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.names.namespace = Some(namespace.into());
        self
    }

    pub fn with_null_markers(mut self, markers: impl IntoIterator<Item = String>) -> Self {
        self.null_markers = markers.into_iter().collect();
        self
    }

    /// Parse `{ "<table>": [ {row}, ... ], ... }` JSON.
    pub fn from_json_str(names: TableNames, text: &str) -> SchemaResult<Self> {
        let tables: Map<String, JsonValue> =
            serde_json::from_str(text).map_err(|e| SchemaError::JsonError { source: e })?;

        let mut source = Self::new(names);
        for (table, rows) in tables {
            let rows = match rows {
                JsonValue::Array(rows) => rows,
                _ => {
                    return Err(SchemaError::ConfigError {
                        message: format!("table `{}` must hold a list of rows", table),
                    });
                }
            };
            for row in rows {
                match row {
                    JsonValue::Object(row) => source.push_row(&table, row)?,
                    _ => {
                        return Err(SchemaError::ConfigError {
                            message: format!("rows of table `{}` must be tables", table),
                        });
                    }
                }
            }
        }
        Ok(source)
    }

    /// Add one row of `table`.
    pub fn push_row(&mut self, table: &str, row: Map<String, JsonValue>) -> SchemaResult<()> {
        let kind = self.resolve_table(table)?;
        self.rows.push(RawRecord { kind, fields: row });
        Ok(())
    }

    /// Add several rows of `table`.
    pub fn push_rows(
        &mut self,
        table: &str,
        rows: impl IntoIterator<Item = Map<String, JsonValue>>,
    ) -> SchemaResult<()> {
        for row in rows {
            self.push_row(table, row)?;
        }
        Ok(())
    }

    fn resolve_table(&self, table: &str) -> SchemaResult<RecordKind> {
        let bare = match &self.names.namespace {
            Some(ns) => table
                .strip_prefix(ns.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(table),
            None => table,
        };

        self.names.kind_of(bare).ok_or_else(|| SchemaError::ConfigError {
            message: format!("`{}` is not a schema-schema table", table),
        })
    }

    fn normalize(&self, row: &RawRecord) -> RawRecord {
        let mut fields = Map::new();
        for (column, value) in &row.fields {
            if row.kind != RecordKind::Schema && AUDIT_COLUMNS.contains(&column.as_str()) {
                continue;
            }

            let name = match column.as_str() {
                "column_position" => "position",
                "sa_coltype" => "type_spec",
                "null_allowed" => "nullable",
                other => other,
            };
            let value = match value {
                JsonValue::String(s) if self.null_markers.iter().any(|m| m == s.trim()) => {
                    JsonValue::Null
                }
                other => other.clone(),
            };
            fields.insert(name.to_string(), value);
        }

        RawRecord {
            kind: row.kind,
            fields,
        }
    }
}

impl RecordSource for TableRowSource {
    fn records(&self, selector: &SchemaSelector) -> SchemaResult<Vec<RawRecord>> {
        let records: Vec<_> = self.rows.iter().map(|row| self.normalize(row)).collect();
        let records = select(records, selector);
        debug!(rows = records.len(), namespace = ?self.names.namespace, "read schema-schema rows");
        Ok(records)
    }

    fn describe(&self) -> String {
        match &self.names.namespace {
            Some(ns) => format!("schema-schema tables in `{}`", ns),
            None => "schema-schema tables".to_string(),
        }
    }
}

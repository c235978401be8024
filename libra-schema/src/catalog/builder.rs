//! Ingestion of raw records into per-schema catalogs.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::ast::Value;
use crate::cache::TypeSpecCache;
use crate::config::DuplicatePolicy;
use crate::error::{Notice, SchemaError, SchemaResult};
use crate::evaluator::DefaultEvaluator;
use crate::parser::parse_list_literal;
use crate::source::tables::AUDIT_COLUMNS;
use crate::source::{RawRecord, RecordKind};

use super::{
    AutoIncrement, Catalog, ColumnDef, ConstraintDef, ConstraintKind, ModelColumnAssoc, ModelMeta,
    SchemaMeta,
};

/// A successfully ingested schema.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub catalog: Catalog,
    pub notices: Vec<Notice>,
}

/// Split a batch by schema name, keeping first-seen order within each schema.
///
/// A record without a schema name cannot be attributed to any schema, so it
/// fails the whole batch with [`SchemaError::IncompleteRecord`].
pub fn group_by_schema(
    records: impl IntoIterator<Item = RawRecord>,
) -> SchemaResult<IndexMap<SmolStr, Vec<RawRecord>>> {
    let mut groups: IndexMap<SmolStr, Vec<RawRecord>> = IndexMap::new();
    for record in records {
        let schema = match record.schema_name() {
            Some(name) => SmolStr::new(name),
            None => {
                return Err(SchemaError::incomplete(
                    record.kind,
                    record.key(),
                    "schema_name",
                ));
            }
        };
        groups.entry(schema).or_default().push(record);
    }
    groups.sort_keys();
    Ok(groups)
}

/// Builds one catalog per schema.
#[derive(Debug)]
pub struct CatalogBuilder<'a> {
    policy: DuplicatePolicy,
    evaluator: DefaultEvaluator,
    cache: &'a TypeSpecCache,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(policy: DuplicatePolicy, evaluator: DefaultEvaluator, cache: &'a TypeSpecCache) -> Self {
        Self {
            policy,
            evaluator,
            cache,
        }
    }

    /// Ingest every record of one schema.
    ///
    /// All record-level errors are collected before giving up, so a caller
    /// sees every bad record at once.
    pub fn build_schema(
        &self,
        schema: &str,
        records: &[RawRecord],
    ) -> Result<Ingested, Vec<SchemaError>> {
        let mut state = SchemaIngest {
            builder: self,
            catalog: Catalog::new(schema),
            notices: Vec::new(),
            errors: Vec::new(),
        };

        for record in records {
            if let Err(e) = state.ingest(record) {
                state.errors.push(e);
            }
        }

        debug!(
            schema,
            columns = state.catalog.columns.len(),
            models = state.catalog.models.len(),
            errors = state.errors.len(),
            "ingested schema records"
        );

        if state.errors.is_empty() {
            Ok(Ingested {
                catalog: state.catalog,
                notices: state.notices,
            })
        } else {
            Err(state.errors)
        }
    }
}

struct SchemaIngest<'b, 'a> {
    builder: &'b CatalogBuilder<'a>,
    catalog: Catalog,
    notices: Vec<Notice>,
    errors: Vec<SchemaError>,
}

impl SchemaIngest<'_, '_> {
    fn ingest(&mut self, record: &RawRecord) -> SchemaResult<()> {
        if let Some(field) = record.missing_field() {
            return Err(SchemaError::incomplete(record.kind, record.key(), field));
        }

        match record.kind {
            RecordKind::Schema => self.schema(record),
            RecordKind::Model => self.model(record),
            RecordKind::Column => self.column(record),
            RecordKind::Association => self.association(record),
            RecordKind::Constraint => self.constraint(record),
        }
    }

    /// Decide whether a record may replace an earlier one with the same key.
    fn replace(&mut self, record: &RawRecord) -> SchemaResult<()> {
        match self.builder.policy {
            DuplicatePolicy::Error => Err(SchemaError::DuplicateRecord {
                kind: record.kind,
                key: record.key(),
            }),
            DuplicatePolicy::Overwrite => {
                let notice = Notice::OverwriteNotice {
                    schema: self.catalog.name.to_string(),
                    kind: record.kind,
                    key: record.key(),
                };
                warn!(%notice, "record overwritten");
                self.notices.push(notice);
                Ok(())
            }
        }
    }

    fn schema(&mut self, record: &RawRecord) -> SchemaResult<()> {
        let audit = AUDIT_COLUMNS
            .iter()
            .filter_map(|field| record.get(field).map(|v| (field.to_string(), v.clone())))
            .collect();
        let meta = SchemaMeta {
            name: self.catalog.name.clone(),
            description: optional_text(record, "description")?,
            audit,
        };

        if self.catalog.schema.is_some() {
            self.replace(record)?;
        }
        self.catalog.schema = Some(meta);
        Ok(())
    }

    fn model(&mut self, record: &RawRecord) -> SchemaResult<()> {
        let name = SmolStr::new(required_text(record, "model_name")?);
        let meta = ModelMeta {
            name: name.clone(),
            description: optional_text(record, "description")?,
        };

        let exists = self
            .catalog
            .models
            .get(&name)
            .is_some_and(|entry| entry.meta.is_some());
        if exists {
            self.replace(record)?;
        }
        self.catalog.models.entry(name).or_default().meta = Some(meta);
        Ok(())
    }

    fn column(&mut self, record: &RawRecord) -> SchemaResult<()> {
        let key = record.key();
        let name = SmolStr::new(required_text(record, "column_name")?);
        let type_spec = required_text(record, "type_spec")?.to_string();

        let parsed = self
            .builder
            .cache
            .get_or_parse(&type_spec)
            .map_err(|e| e.located(&key, "type_spec"))?;
        self.notices.extend(parsed.notices.iter().cloned());

        let default = match record.get("default_val") {
            Some(raw) => self
                .builder
                .evaluator
                .classify_json(raw, &mut self.notices)
                .map_err(|e| e.located(&key, "default_val"))?,
            None => None,
        };

        let def = ColumnDef {
            name: name.clone(),
            alias: optional_text(record, "column_alias")?.map(SmolStr::from),
            type_spec,
            descriptor: parsed.descriptor,
            default,
            description: optional_text(record, "description")?,
        };

        if self.catalog.columns.contains_key(&name) {
            self.replace(record)?;
        }
        self.catalog.columns.insert(name, def);
        Ok(())
    }

    fn association(&mut self, record: &RawRecord) -> SchemaResult<()> {
        let key = record.key();
        let kind = record.kind;
        let model = SmolStr::new(required_text(record, "model_name")?);
        let column = SmolStr::new(required_text(record, "column_name")?);

        let position = record
            .get("position")
            .and_then(integer)
            .ok_or_else(|| SchemaError::invalid_field(kind, &key, "position", "expected an integer"))?;
        let nullable = record
            .get("nullable")
            .and_then(flag)
            .ok_or_else(|| SchemaError::invalid_field(kind, &key, "nullable", "expected a boolean"))?;
        let autoincrement = match record.get("autoincrement") {
            Some(JsonValue::Bool(true)) => Some(AutoIncrement::True),
            Some(JsonValue::Bool(false)) => Some(AutoIncrement::False),
            Some(JsonValue::String(text)) => AutoIncrement::parse(text),
            _ => None,
        }
        .ok_or_else(|| {
            SchemaError::invalid_field(
                kind,
                &key,
                "autoincrement",
                "expected one of auto, True, False, ignore_fk",
            )
        })?;
        let quote = match record.get("quote") {
            None => None,
            Some(raw) => Some(flag(raw).ok_or_else(|| {
                SchemaError::invalid_field(kind, &key, "quote", "expected a boolean")
            })?),
        };
        let onupdate = match record.get("onupdate") {
            Some(raw) => self
                .builder
                .evaluator
                .classify_json(raw, &mut self.notices)
                .map_err(|e| e.located(&key, "onupdate"))?,
            None => None,
        };
        let info = match record.get("info") {
            None => IndexMap::new(),
            Some(JsonValue::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(_) => {
                return Err(SchemaError::invalid_field(
                    kind,
                    &key,
                    "info",
                    "expected a key/value table",
                ));
            }
        };

        let assoc = ModelColumnAssoc {
            model: model.clone(),
            column: column.clone(),
            position,
            nullable,
            autoincrement,
            quote,
            onupdate,
            info,
        };

        let exists = self
            .catalog
            .models
            .get(&model)
            .is_some_and(|entry| entry.associations.contains_key(&column));
        if exists {
            self.replace(record)?;
        }
        self.catalog
            .models
            .entry(model)
            .or_default()
            .associations
            .insert(column, assoc);
        Ok(())
    }

    fn constraint(&mut self, record: &RawRecord) -> SchemaResult<()> {
        let key = record.key();
        let code = required_text(record, "constraint_type")?;
        let kind = ConstraintKind::parse(code).ok_or_else(|| {
            SchemaError::invalid_field(
                record.kind,
                &key,
                "constraint_type",
                format!("unknown constraint type `{}`", code),
            )
        })?;
        let model = SmolStr::new(required_text(record, "model_name")?);

        let def = ConstraintDef {
            kind,
            name: optional_text(record, "constraint_name")?,
            model: model.clone(),
            columns: column_list(record, &key)?,
            reference: optional_text(record, "reference")?,
            ondelete: optional_text(record, "ondelete")?,
            onupdate: optional_text(record, "onupdate")?,
            sqltext: optional_text(record, "sqltext")?,
            deferrable: match record.get("deferrable") {
                None => None,
                Some(raw) => Some(flag(raw).ok_or_else(|| {
                    SchemaError::invalid_field(record.kind, &key, "deferrable", "expected a boolean")
                })?),
            },
            initially: optional_text(record, "initially")?,
        };

        let slot = def.slot();
        let exists = self
            .catalog
            .models
            .get(&model)
            .is_some_and(|entry| entry.constraints.contains_key(&slot));
        if exists {
            self.replace(record)?;
        }
        self.catalog
            .models
            .entry(model)
            .or_default()
            .constraints
            .insert(slot, def);
        Ok(())
    }
}

fn required_text<'r>(record: &'r RawRecord, field: &str) -> SchemaResult<&'r str> {
    match record.get(field) {
        Some(JsonValue::String(s)) => Ok(s),
        Some(_) => Err(SchemaError::invalid_field(
            record.kind,
            record.key(),
            field,
            "expected text",
        )),
        None => Err(SchemaError::incomplete(record.kind, record.key(), field)),
    }
}

/// Text field that may be absent. Scalars are rendered as text.
fn optional_text(record: &RawRecord, field: &str) -> SchemaResult<Option<String>> {
    match record.get(field) {
        None => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(v @ (JsonValue::Number(_) | JsonValue::Bool(_))) => Ok(Some(v.to_string())),
        Some(_) => Err(SchemaError::invalid_field(
            record.kind,
            record.key(),
            field,
            "expected text",
        )),
    }
}

/// Accept JSON booleans, `True`/`False` text in any case, and 0/1.
fn flag(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A constraint's columns: a JSON list, or list-literal text like `['a', 'b']`.
fn column_list(record: &RawRecord, key: &str) -> SchemaResult<Vec<String>> {
    let invalid = |message: &str| SchemaError::invalid_field(record.kind, key, "columns", message);

    match record.get("columns") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("expected a list of column names"))
            })
            .collect(),
        Some(JsonValue::String(text)) => {
            let values = parse_list_literal(text)
                .map_err(|e| invalid(&format!("not a list literal: {}", e)))?;
            values
                .iter()
                .map(|value| match value {
                    Value::String(s) => Ok(s.clone()),
                    other => other
                        .as_ident()
                        .map(str::to_string)
                        .ok_or_else(|| invalid("expected a list of column names")),
                })
                .collect()
        }
        Some(_) => Err(invalid("expected a list of column names")),
        None => Err(SchemaError::incomplete(record.kind, key, "columns")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder(cache: &TypeSpecCache, policy: DuplicatePolicy) -> CatalogBuilder<'_> {
        CatalogBuilder::new(policy, DefaultEvaluator::default(), cache)
    }

    fn column(name: &str, spec: &str) -> RawRecord {
        RawRecord::new(RecordKind::Column)
            .with("column_name", name)
            .with("schema_name", "Libra")
            .with("type_spec", spec)
    }

    fn assoc(model: &str, column: &str, position: i64) -> RawRecord {
        RawRecord::new(RecordKind::Association)
            .with("model_name", model)
            .with("column_name", column)
            .with("schema_name", "Libra")
            .with("position", position)
            .with("nullable", false)
            .with("autoincrement", "auto")
    }

    #[test]
    fn test_group_by_schema_sorts_and_requires_name() {
        let records = vec![
            RawRecord::new(RecordKind::Schema).with("schema_name", "b"),
            RawRecord::new(RecordKind::Schema).with("schema_name", "a"),
        ];
        let groups = group_by_schema(records).unwrap();
        let names: Vec<_> = groups.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let err = group_by_schema(vec![RawRecord::new(RecordKind::Model).with("model_name", "m")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::IncompleteRecord { .. }));
    }

    #[test]
    fn test_build_minimal_catalog() {
        let cache = TypeSpecCache::new();
        let records = vec![
            RawRecord::new(RecordKind::Schema)
                .with("schema_name", "Libra")
                .with("description", "meta")
                .with("loadauthor", "someone"),
            RawRecord::new(RecordKind::Model)
                .with("model_name", "testmodel1")
                .with("schema_name", "Libra"),
            column("testcolumn1", "String(30)").with("default_val", "-"),
            assoc("testmodel1", "testcolumn1", 0).with("info", json!({ "regex": "^a" })),
            RawRecord::new(RecordKind::Constraint)
                .with("constraint_type", "pk")
                .with("model_name", "testmodel1")
                .with("schema_name", "Libra")
                .with("columns", "['testcolumn1']"),
        ];

        let ingested = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &records)
            .unwrap();
        let catalog = ingested.catalog;

        let meta = catalog.schema.as_ref().unwrap();
        assert_eq!(meta.description.as_deref(), Some("meta"));
        assert_eq!(meta.audit.get("loadauthor"), Some(&json!("someone")));

        let col = catalog.column("testcolumn1").unwrap();
        assert_eq!(col.descriptor.to_string(), "String(30)");
        assert!(col.default.as_ref().unwrap().as_literal().unwrap().is_null());

        let model = catalog.model("testmodel1").unwrap();
        let a = &model.associations["testcolumn1"];
        assert!(!a.nullable);
        assert_eq!(a.info.get("regex"), Some(&json!("^a")));

        let pk = model.constraints.values().next().unwrap();
        assert_eq!(pk.kind, ConstraintKind::PrimaryKey);
        assert_eq!(pk.columns, vec!["testcolumn1"]);
        assert!(ingested.notices.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let cache = TypeSpecCache::new();
        let record = RawRecord::new(RecordKind::Column)
            .with("column_name", "c")
            .with("schema_name", "Libra");
        let errors = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &[record])
            .unwrap_err();
        match &errors[0] {
            SchemaError::IncompleteRecord { key, field, .. } => {
                assert_eq!(key, "Libra.c");
                assert_eq!(field, "type_spec");
            }
            other => panic!("Expected IncompleteRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_type_spec_is_located() {
        let cache = TypeSpecCache::new();
        let errors = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &[column("price", "Numeric(10,")])
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Libra.price.type_spec"));
    }

    #[test]
    fn test_errors_are_collected() {
        let cache = TypeSpecCache::new();
        let records = vec![
            column("a", "Bad(("),
            column("b", "Integer").with("default_val", "now"),
            assoc("m", "a", 0).with("nullable", "maybe"),
        ];
        let errors = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &records)
            .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[1], SchemaError::UnresolvableDefault { .. }));
        assert!(matches!(errors[2], SchemaError::InvalidField { .. }));
    }

    #[test]
    fn test_last_write_wins_with_notice() {
        let cache = TypeSpecCache::new();
        let records = vec![column("c", "Integer"), column("c", "BigInteger")];
        let ingested = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &records)
            .unwrap();
        assert_eq!(ingested.catalog.column("c").unwrap().type_spec, "BigInteger");
        assert_eq!(
            ingested.notices,
            vec![Notice::OverwriteNotice {
                schema: "Libra".into(),
                kind: RecordKind::Column,
                key: "Libra.c".into(),
            }]
        );
    }

    #[test]
    fn test_error_on_duplicate() {
        let cache = TypeSpecCache::new();
        let records = vec![assoc("m", "c", 0), assoc("m", "c", 1)];
        let errors = builder(&cache, DuplicatePolicy::Error)
            .build_schema("Libra", &records)
            .unwrap_err();
        assert!(matches!(errors[0], SchemaError::DuplicateRecord { .. }));
    }

    #[test]
    fn test_named_constraints_do_not_collide() {
        let cache = TypeSpecCache::new();
        let uq = |name: &str, col: &str| {
            RawRecord::new(RecordKind::Constraint)
                .with("constraint_type", "uc")
                .with("model_name", "m")
                .with("schema_name", "Libra")
                .with("constraint_name", name)
                .with("columns", json!([col]))
        };
        let ingested = builder(&cache, DuplicatePolicy::Error)
            .build_schema("Libra", &[uq("uq_a", "a"), uq("uq_b", "b")])
            .unwrap();
        assert_eq!(ingested.catalog.model("m").unwrap().constraints.len(), 2);
    }

    #[test]
    fn test_unnamed_constraints_keyed_by_content() {
        let cache = TypeSpecCache::new();
        let base = |kind: &str, columns: serde_json::Value| {
            RawRecord::new(RecordKind::Constraint)
                .with("constraint_type", kind)
                .with("model_name", "m")
                .with("schema_name", "Libra")
                .with("columns", columns)
        };
        let records = [
            base("fk", json!(["a_id"])).with("reference", "a.id"),
            base("fk", json!(["b_id"])).with("reference", "b.id"),
            base("uq", json!(["a_id", "b_id"])),
            base("uq", json!(["b_id", "a_id"])),
        ];
        let ingested = builder(&cache, DuplicatePolicy::Error)
            .build_schema("Libra", &records)
            .unwrap();
        assert_eq!(ingested.catalog.model("m").unwrap().constraints.len(), 4);
        assert!(ingested.notices.is_empty());

        let repeated = [base("uq", json!(["a_id"])), base("uq", json!("['a_id']"))];
        let ingested = builder(&cache, DuplicatePolicy::Overwrite)
            .build_schema("Libra", &repeated)
            .unwrap();
        assert_eq!(ingested.catalog.model("m").unwrap().constraints.len(), 1);
        assert!(matches!(
            &ingested.notices[..],
            [Notice::OverwriteNotice { key, .. }] if key == "Libra.m.uq[a_id]"
        ));
    }

    #[test]
    fn test_flag_and_integer_coercion() {
        assert_eq!(flag(&json!("False")), Some(false));
        assert_eq!(flag(&json!("TRUE")), Some(true));
        assert_eq!(flag(&json!(1)), Some(true));
        assert_eq!(flag(&json!("yes")), None);
        assert_eq!(integer(&json!("3")), Some(3));
        assert_eq!(integer(&json!(2.5)), None);
    }
}

//! Association resolution.
//!
//! Merges every association of a model with the column definition it names,
//! producing the ordered column list consumed downstream. The column
//! definition supplies identity, type, default and description; the
//! association supplies everything per-model.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::{DefaultValue, TypeDescriptor};
use crate::catalog::{AutoIncrement, Catalog, ConstraintDef, ModelColumnAssoc, ModelEntry, SchemaMeta};
use crate::error::SchemaError;
use crate::typemap::TypeMap;

/// A column definition merged with one model's association.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedColumn {
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    pub position: usize,
    /// The type spec exactly as supplied.
    pub type_spec: String,
    /// The parsed spec with the type map applied.
    pub descriptor: TypeDescriptor,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub autoincrement: AutoIncrement,
    pub onupdate: Option<DefaultValue>,
    pub quote: Option<bool>,
    pub info: IndexMap<String, JsonValue>,
    pub description: Option<String>,
}

/// A model with its columns in position order.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub name: SmolStr,
    pub description: Option<String>,
    pub columns: Vec<ResolvedColumn>,
    /// Constraints as declared; checked by the validator.
    pub constraints: Vec<ConstraintDef>,
}

impl ResolvedModel {
    /// Get a resolved column by name.
    pub fn column(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Every model of one schema, resolved.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub name: SmolStr,
    pub meta: SchemaMeta,
    pub models: Vec<ResolvedModel>,
}

impl ResolvedSchema {
    /// Get a resolved model by name.
    pub fn model(&self, name: &str) -> Option<&ResolvedModel> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Resolves catalogs into ordered column lists.
#[derive(Debug, Clone, Default)]
pub struct AssociationResolver {
    type_map: TypeMap,
}

impl AssociationResolver {
    pub fn new(type_map: TypeMap) -> Self {
        Self { type_map }
    }

    /// Resolve every model of a catalog.
    ///
    /// All structural errors of the schema are returned together.
    pub fn resolve(&self, catalog: &Catalog) -> Result<ResolvedSchema, Vec<SchemaError>> {
        let mut errors = Vec::new();

        let meta = catalog.schema.clone();
        if meta.is_none() {
            errors.push(SchemaError::UnknownSchema {
                schema: catalog.name.to_string(),
            });
        }

        let mut models = Vec::with_capacity(catalog.models.len());
        for (name, entry) in &catalog.models {
            match self.resolve_model(catalog, name, entry) {
                Ok(model) => models.push(model),
                Err(mut model_errors) => errors.append(&mut model_errors),
            }
        }

        debug!(
            schema = %catalog.name,
            models = models.len(),
            errors = errors.len(),
            "resolved associations"
        );

        match meta {
            Some(meta) if errors.is_empty() => Ok(ResolvedSchema {
                name: catalog.name.clone(),
                meta,
                models,
            }),
            _ => Err(errors),
        }
    }

    fn resolve_model(
        &self,
        catalog: &Catalog,
        name: &SmolStr,
        entry: &ModelEntry,
    ) -> Result<ResolvedModel, Vec<SchemaError>> {
        let Some(meta) = &entry.meta else {
            return Err(vec![SchemaError::unknown_model(catalog.name.as_str(), name.as_str())]);
        };

        let mut errors = Vec::new();
        let ordered = match check_positions(catalog, name, entry) {
            Ok(ordered) => ordered,
            Err(e) => {
                errors.push(e);
                entry.associations.values().collect()
            }
        };

        let mut columns = Vec::with_capacity(ordered.len());
        for assoc in ordered {
            match catalog.column(&assoc.column) {
                Some(def) => columns.push(ResolvedColumn {
                    name: def.name.clone(),
                    alias: def.alias.clone(),
                    position: columns.len(),
                    type_spec: def.type_spec.clone(),
                    descriptor: self.type_map.apply(&def.descriptor),
                    nullable: assoc.nullable,
                    default: def.default.clone(),
                    autoincrement: assoc.autoincrement,
                    onupdate: assoc.onupdate.clone(),
                    quote: assoc.quote,
                    info: assoc.info.clone(),
                    description: def.description.clone(),
                }),
                None => errors.push(SchemaError::unknown_column(
                    catalog.name.as_str(),
                    name.as_str(),
                    assoc.column.as_str(),
                )),
            }
        }

        if errors.is_empty() {
            Ok(ResolvedModel {
                name: name.clone(),
                description: meta.description.clone(),
                columns,
                constraints: entry.constraints.values().cloned().collect(),
            })
        } else {
            Err(errors)
        }
    }
}

/// Sort associations by position, rejecting repeats and gaps.
fn check_positions<'c>(
    catalog: &Catalog,
    model: &str,
    entry: &'c ModelEntry,
) -> Result<Vec<&'c ModelColumnAssoc>, SchemaError> {
    let mut claimed: HashMap<i64, &str> = HashMap::new();
    for assoc in entry.associations.values() {
        if let Some(first) = claimed.insert(assoc.position, &assoc.column) {
            return Err(SchemaError::PositionConflict {
                schema: catalog.name.to_string(),
                model: model.to_string(),
                position: assoc.position,
                first: first.to_string(),
                second: assoc.column.to_string(),
            });
        }
    }

    let mut ordered: Vec<_> = entry.associations.values().collect();
    ordered.sort_by_key(|assoc| assoc.position);

    for (expected, assoc) in ordered.iter().enumerate() {
        if assoc.position != expected as i64 {
            return Err(SchemaError::PositionGap {
                schema: catalog.name.to_string(),
                model: model.to_string(),
                expected,
                found: assoc.position,
            });
        }
    }

    Ok(ordered)
}

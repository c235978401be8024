//! Constraint validation and cross-schema reference resolution.
//!
//! Each model's constraints are checked against its resolved columns in a
//! fixed order: primary key, unique, foreign key, check. Foreign keys are
//! looked up in a [`ReferenceIndex`] that is built once from every ingested
//! catalog and shared read-only while schemas are validated.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::catalog::{Catalog, ConstraintDef, ConstraintKind};
use crate::error::{PrimaryKeyFault, SchemaError};
use crate::resolver::{ResolvedModel, ResolvedSchema};

/// Recognised `ondelete` / `onupdate` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    /// Parse an action, ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let words: Vec<_> = text.split_whitespace().collect();
        match words.join(" ").to_ascii_uppercase().as_str() {
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "RESTRICT" => Some(Self::Restrict),
            "NO ACTION" => Some(Self::NoAction),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetDefault => "SET DEFAULT",
        })
    }
}

/// When a deferrable constraint is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Initially {
    Immediate,
    Deferred,
}

impl Initially {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "IMMEDIATE" => Some(Self::Immediate),
            "DEFERRED" => Some(Self::Deferred),
            _ => None,
        }
    }
}

/// A fully qualified column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub schema: SmolStr,
    pub model: SmolStr,
    pub column: SmolStr,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.model, self.column)
    }
}

/// The resolved target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub target: ColumnRef,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

/// A validated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqltext: Option<String>,
    pub deferrable: Option<bool>,
    pub initially: Option<Initially>,
}

#[derive(Debug, Default)]
struct KeyColumns {
    primary: HashSet<String>,
    unique: HashSet<String>,
}

/// Key columns of every loaded model, for foreign-key lookups.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    keys: HashMap<(SmolStr, SmolStr), KeyColumns>,
    /// Model name to the schemas declaring it.
    owners: HashMap<SmolStr, BTreeSet<SmolStr>>,
}

impl ReferenceIndex {
    /// Index the declared models of the given catalogs.
    pub fn from_catalogs<'a>(catalogs: impl IntoIterator<Item = &'a Catalog>) -> Self {
        let mut index = Self::default();
        for catalog in catalogs {
            for (model, entry) in &catalog.models {
                if entry.meta.is_none() {
                    continue;
                }
                let mut keys = KeyColumns::default();
                for def in entry.constraints.values() {
                    match def.kind {
                        ConstraintKind::PrimaryKey => keys.primary.extend(def.columns.iter().cloned()),
                        ConstraintKind::Unique if def.columns.len() == 1 => {
                            keys.unique.extend(def.columns.iter().cloned())
                        }
                        _ => {}
                    }
                }
                index
                    .keys
                    .insert((catalog.name.clone(), model.clone()), keys);
                index
                    .owners
                    .entry(model.clone())
                    .or_default()
                    .insert(catalog.name.clone());
            }
        }
        debug!(models = index.keys.len(), "built reference index");
        index
    }

    /// Whether `schema` declares `model`.
    pub fn contains(&self, schema: &str, model: &str) -> bool {
        self.keys
            .contains_key(&(SmolStr::new(schema), SmolStr::new(model)))
    }

    /// Find the schema and model a reference points at.
    ///
    /// References take the form `model.column` or `schema.model.column`. An
    /// unqualified model is looked up in `from` first, then in exactly one
    /// other schema.
    pub fn locate(&self, from: &str, reference: &str) -> Result<ColumnRef, String> {
        let parts: Vec<&str> = reference.split('.').map(str::trim).collect();
        let (schema, model, column) = match parts.as_slice() {
            [model, column] => (None, *model, *column),
            [schema, model, column] => (Some(*schema), *model, *column),
            _ => return Err("expected `model.column` or `schema.model.column`".to_string()),
        };
        if model.is_empty() || column.is_empty() || schema.is_some_and(str::is_empty) {
            return Err("expected `model.column` or `schema.model.column`".to_string());
        }

        let schema = match schema {
            Some(schema) if self.contains(schema, model) => SmolStr::new(schema),
            Some(schema) => {
                return Err(format!("model `{}` is not loaded in schema `{}`", model, schema));
            }
            None if self.contains(from, model) => SmolStr::new(from),
            None => {
                let owners: Vec<_> = self
                    .owners
                    .get(model)
                    .into_iter()
                    .flatten()
                    .filter(|owner| owner.as_str() != from)
                    .collect();
                match owners.as_slice() {
                    [] => {
                        return Err(format!("model `{}` is not loaded in any known schema", model));
                    }
                    [owner] => (*owner).clone(),
                    many => {
                        let names: Vec<_> = many.iter().map(|s| s.as_str()).collect();
                        return Err(format!(
                            "model `{}` is ambiguous between schemas {}",
                            model,
                            names.join(", ")
                        ));
                    }
                }
            }
        };

        Ok(ColumnRef {
            schema,
            model: SmolStr::new(model),
            column: SmolStr::new(column),
        })
    }

    /// Locate a reference and check that it lands on a key column.
    pub fn resolve(&self, from: &str, reference: &str) -> Result<ColumnRef, String> {
        let target = self.locate(from, reference)?;
        let keys = self
            .keys
            .get(&(target.schema.clone(), target.model.clone()));
        let is_key = keys.is_some_and(|k| {
            k.primary.contains(target.column.as_str()) || k.unique.contains(target.column.as_str())
        });
        if is_key {
            Ok(target)
        } else {
            Err(format!(
                "`{}.{}` is neither a primary key column nor uniquely constrained",
                target.model, target.column
            ))
        }
    }
}

/// Validates the constraints of resolved schemas.
#[derive(Debug)]
pub struct ConstraintValidator<'a> {
    index: &'a ReferenceIndex,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(index: &'a ReferenceIndex) -> Self {
        Self { index }
    }

    /// Validate every model of a schema.
    ///
    /// Returns the validated constraints per model, in model order.
    pub fn validate(
        &self,
        schema: &ResolvedSchema,
    ) -> Result<Vec<(SmolStr, Vec<Constraint>)>, Vec<SchemaError>> {
        let mut errors = Vec::new();
        let mut validated = Vec::with_capacity(schema.models.len());

        for model in &schema.models {
            let mut check = ModelCheck {
                index: self.index,
                schema: &schema.name,
                model,
                errors: &mut errors,
            };
            validated.push((model.name.clone(), check.run()));
        }

        debug!(
            schema = %schema.name,
            models = validated.len(),
            errors = errors.len(),
            "validated constraints"
        );

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}

struct ModelCheck<'v> {
    index: &'v ReferenceIndex,
    schema: &'v str,
    model: &'v ResolvedModel,
    errors: &'v mut Vec<SchemaError>,
}

impl ModelCheck<'_> {
    fn run(&mut self) -> Vec<Constraint> {
        let model = self.model;
        let of_kind = |kind: ConstraintKind| {
            model
                .constraints
                .iter()
                .filter(move |c| c.kind == kind)
                .collect::<Vec<_>>()
        };
        let primary = of_kind(ConstraintKind::PrimaryKey);
        let unique = of_kind(ConstraintKind::Unique);
        let foreign = of_kind(ConstraintKind::ForeignKey);
        let check = of_kind(ConstraintKind::Check);

        let mut out = Vec::with_capacity(model.constraints.len());
        self.primary_keys(&primary, &mut out);
        self.unique_keys(&unique, &mut out);
        for def in foreign {
            if let Some(c) = self.foreign_key(def) {
                out.push(c);
            }
        }
        for def in check {
            if let Some(c) = self.check(def) {
                out.push(c);
            }
        }
        out
    }

    fn fail(&mut self, error: SchemaError) {
        trace!(schema = self.schema, model = %self.model.name, %error, "constraint rejected");
        self.errors.push(error);
    }

    fn invalid(&mut self, def: &ConstraintDef, message: impl Into<String>) {
        let error = SchemaError::invalid_constraint(self.schema, self.model.name.as_str(), def.label(), message);
        self.fail(error);
    }

    /// Checks shared by every kind; `None` when the constraint is unusable.
    fn common(&mut self, def: &ConstraintDef) -> Option<Constraint> {
        let mut ok = true;

        let mut seen = HashSet::new();
        for column in &def.columns {
            if !seen.insert(column.as_str()) {
                self.invalid(def, format!("column `{}` is listed twice", column));
                ok = false;
            }
        }

        let initially = match def.initially.as_deref() {
            None => None,
            Some(text) => match Initially::parse(text) {
                Some(initially) => Some(initially),
                None => {
                    self.invalid(
                        def,
                        format!("initially must be IMMEDIATE or DEFERRED, got `{}`", text),
                    );
                    ok = false;
                    None
                }
            },
        };

        ok.then(|| Constraint {
            kind: def.kind,
            name: def.name.clone(),
            columns: def.columns.clone(),
            foreign_key: None,
            sqltext: None,
            deferrable: def.deferrable,
            initially,
        })
    }

    fn primary_keys(&mut self, defs: &[&ConstraintDef], out: &mut Vec<Constraint>) {
        if defs.len() > 1 {
            let error = SchemaError::invalid_primary_key(
                self.schema,
                self.model.name.as_str(),
                PrimaryKeyFault::MoreThanOne(defs.len()),
            );
            self.fail(error);
            return;
        }
        let Some(def) = defs.first() else {
            return;
        };

        if def.columns.is_empty() {
            self.invalid(def, "no columns listed");
            return;
        }
        let mut ok = true;
        for column in &def.columns {
            let fault = match self.model.column(column) {
                None => PrimaryKeyFault::MissingColumn(column.clone()),
                Some(resolved) if resolved.nullable => PrimaryKeyFault::NullableColumn(column.clone()),
                Some(_) => continue,
            };
            let error = SchemaError::invalid_primary_key(self.schema, self.model.name.as_str(), fault);
            self.fail(error);
            ok = false;
        }
        if let Some(c) = self.common(def).filter(|_| ok) {
            out.push(c);
        }
    }

    fn unique_keys(&mut self, defs: &[&ConstraintDef], out: &mut Vec<Constraint>) {
        let mut sets: Vec<BTreeSet<&str>> = Vec::new();
        for def in defs {
            if def.columns.is_empty() {
                self.invalid(def, "no columns listed");
                continue;
            }
            if !self.columns_exist(&def.columns) {
                continue;
            }

            let set: BTreeSet<&str> = def.columns.iter().map(String::as_str).collect();
            if sets.contains(&set) {
                let error = SchemaError::DuplicateUniqueConstraint {
                    schema: self.schema.to_string(),
                    model: self.model.name.to_string(),
                    columns: def.columns.clone(),
                };
                self.fail(error);
                continue;
            }
            sets.push(set);

            if let Some(c) = self.common(def) {
                out.push(c);
            }
        }
    }

    fn foreign_key(&mut self, def: &ConstraintDef) -> Option<Constraint> {
        if def.columns.len() != 1 {
            self.invalid(def, "a foreign key names exactly one local column");
            return None;
        }
        let local_ok = self.columns_exist(&def.columns);

        let Some(reference) = def.reference.as_deref() else {
            self.invalid(def, "missing reference");
            return None;
        };
        let target = match self.index.resolve(self.schema, reference) {
            Ok(target) => Some(target),
            Err(reason) => {
                let error = SchemaError::dangling_foreign_key(
                    self.schema,
                    self.model.name.as_str(),
                    reference,
                    reason,
                );
                self.fail(error);
                None
            }
        };

        let on_delete = self.action(def.ondelete.as_deref(), "ondelete");
        let on_update = self.action(def.onupdate.as_deref(), "onupdate");
        let constraint = self.common(def);

        match (local_ok, target, on_delete, on_update, constraint) {
            (true, Some(target), Ok(on_delete), Ok(on_update), Some(mut c)) => {
                c.foreign_key = Some(ForeignKey {
                    target,
                    on_delete,
                    on_update,
                });
                Some(c)
            }
            _ => None,
        }
    }

    fn check(&mut self, def: &ConstraintDef) -> Option<Constraint> {
        let sqltext = def.sqltext.as_deref().map(str::trim).unwrap_or_default();
        if sqltext.is_empty() {
            let error = SchemaError::EmptyCheckConstraint {
                schema: self.schema.to_string(),
                model: self.model.name.to_string(),
                name: def.name.clone().unwrap_or_else(|| "(unnamed)".to_string()),
            };
            self.fail(error);
            return None;
        }
        let mut c = self.common(def)?;
        c.sqltext = def.sqltext.clone();
        Some(c)
    }

    fn action(&mut self, text: Option<&str>, clause: &str) -> Result<Option<ReferentialAction>, ()> {
        let Some(text) = text else {
            return Ok(None);
        };
        match ReferentialAction::parse(text) {
            Some(action) => Ok(Some(action)),
            None => {
                let error = SchemaError::InvalidReferentialAction {
                    schema: self.schema.to_string(),
                    model: self.model.name.to_string(),
                    clause: clause.to_string(),
                    action: text.to_string(),
                };
                self.fail(error);
                Err(())
            }
        }
    }

    /// Report every listed column missing from the model.
    fn columns_exist(&mut self, columns: &[String]) -> bool {
        let mut ok = true;
        for column in columns {
            if self.model.column(column).is_none() {
                let error =
                    SchemaError::unknown_column(self.schema, self.model.name.as_str(), column.as_str());
                self.fail(error);
                ok = false;
            }
        }
        ok
    }
}

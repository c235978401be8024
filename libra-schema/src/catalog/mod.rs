//! The canonical in-memory catalog of one schema.
//!
//! A [`Catalog`] is what the builder produces from raw records: column
//! definitions keyed by name and, per model, its metadata plus the raw
//! associations and constraints. Nothing here is cross-checked yet; that is
//! the resolver's and validator's job.

mod builder;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use smol_str::SmolStr;

use crate::ast::{DefaultValue, TypeDescriptor};

pub use builder::{CatalogBuilder, Ingested, group_by_schema};

/// Schema-level metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaMeta {
    pub name: SmolStr,
    pub description: Option<String>,
    /// Author and load/modification stamps, carried but never interpreted.
    pub audit: IndexMap<String, JsonValue>,
}

/// Model-level metadata.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub name: SmolStr,
    pub description: Option<String>,
}

/// A schema-scoped column definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    /// The type spec exactly as supplied.
    pub type_spec: String,
    pub descriptor: Arc<TypeDescriptor>,
    pub default: Option<DefaultValue>,
    pub description: Option<String>,
}

/// Autoincrement behaviour of a column within a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoIncrement {
    #[default]
    Auto,
    True,
    False,
    IgnoreFk,
}

impl AutoIncrement {
    /// Parse `auto`, `True`, `False` or `ignore_fk` (case-insensitive).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "ignore_fk" => Some(Self::IgnoreFk),
            _ => None,
        }
    }
}

impl fmt::Display for AutoIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::True => "True",
            Self::False => "False",
            Self::IgnoreFk => "ignore_fk",
        })
    }
}

/// The per-model override layer linking a column to a model.
#[derive(Debug, Clone)]
pub struct ModelColumnAssoc {
    pub model: SmolStr,
    pub column: SmolStr,
    pub position: i64,
    pub nullable: bool,
    pub autoincrement: AutoIncrement,
    pub quote: Option<bool>,
    pub onupdate: Option<DefaultValue>,
    pub info: IndexMap<String, JsonValue>,
}

/// Constraint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    /// Parse a constraint type code; `uc` is accepted for `uq`.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "pk" | "primary_key" => Some(Self::PrimaryKey),
            "uq" | "uc" | "unique" => Some(Self::Unique),
            "fk" | "foreign_key" => Some(Self::ForeignKey),
            "ck" | "check" => Some(Self::Check),
            _ => None,
        }
    }

    /// The short code (`pk`, `uq`, `fk`, `ck`).
    pub fn code(self) -> &'static str {
        match self {
            Self::PrimaryKey => "pk",
            Self::Unique => "uq",
            Self::ForeignKey => "fk",
            Self::Check => "ck",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A constraint as declared, before validation.
#[derive(Debug, Clone)]
pub struct ConstraintDef {
    pub kind: ConstraintKind,
    pub name: Option<String>,
    pub model: SmolStr,
    /// Column names in declaration order.
    pub columns: Vec<String>,
    pub reference: Option<String>,
    pub ondelete: Option<String>,
    pub onupdate: Option<String>,
    pub sqltext: Option<String>,
    pub deferrable: Option<bool>,
    pub initially: Option<String>,
}

impl ConstraintDef {
    /// Label used in error messages, e.g. `uq` or `fk fk_owner`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.kind, name),
            None => self.kind.to_string(),
        }
    }
}

/// Identity of a constraint within its model.
///
/// A named constraint is identified by type and name. An unnamed one is
/// identified by what it constrains: its columns in declaration order, plus
/// the reference of a foreign key or the text of a check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintSlot {
    Named(ConstraintKind, String),
    Unnamed {
        kind: ConstraintKind,
        columns: Vec<String>,
        target: Option<String>,
    },
}

impl ConstraintDef {
    /// The slot this constraint occupies in its model.
    pub fn slot(&self) -> ConstraintSlot {
        if let Some(name) = &self.name {
            return ConstraintSlot::Named(self.kind, name.clone());
        }
        let target = match self.kind {
            ConstraintKind::ForeignKey => self.reference.as_deref(),
            ConstraintKind::Check => self.sqltext.as_deref(),
            ConstraintKind::PrimaryKey | ConstraintKind::Unique => None,
        };
        ConstraintSlot::Unnamed {
            kind: self.kind,
            columns: self.columns.clone(),
            target: target.map(|t| t.trim().to_string()),
        }
    }
}

/// Everything a schema knows about one model name.
///
/// `meta` is `None` when associations or constraints name a model that has
/// no model record.
#[derive(Debug, Clone, Default)]
pub struct ModelEntry {
    pub meta: Option<ModelMeta>,
    /// Associations keyed by column name.
    pub associations: IndexMap<SmolStr, ModelColumnAssoc>,
    /// Constraints in declaration order.
    pub constraints: IndexMap<ConstraintSlot, ConstraintDef>,
}

/// The built catalog of one schema.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub name: SmolStr,
    /// `None` when records reference the schema but no schema record exists.
    pub schema: Option<SchemaMeta>,
    pub columns: IndexMap<SmolStr, ColumnDef>,
    pub models: IndexMap<SmolStr, ModelEntry>,
}

impl Catalog {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: IndexMap::new(),
            models: IndexMap::new(),
        }
    }

    /// Get a column definition by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    /// Get a model entry by name.
    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        self.models.get(name)
    }

    /// Names of declared models (those with a model record).
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .filter(|(_, entry)| entry.meta.is_some())
            .map(|(name, _)| name.as_str())
    }

    /// Foreign-key reference strings of every model, in declaration order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.models.iter().flat_map(|(model, entry)| {
            entry
                .constraints
                .values()
                .filter(|c| c.kind == ConstraintKind::ForeignKey)
                .filter_map(move |c| c.reference.as_deref().map(|r| (model.as_str(), r)))
        })
    }
}

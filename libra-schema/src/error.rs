//! Error and advisory types for catalog ingestion, resolution and validation.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::source::RecordKind;

/// Result type for schema-engine operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Where an error sits in the failure taxonomy.
///
/// Parse and structural errors abort the owning schema; integrity errors abort
/// the schema that declared the offending constraint (and anything depending
/// on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A single field could not be parsed.
    Parse,
    /// Records do not form a consistent catalog.
    Structural,
    /// Constraints or cross-schema references are inconsistent.
    Integrity,
    /// Reading input or configuration failed.
    Input,
}

/// Why a primary key was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKeyFault {
    /// A listed column is not part of the model.
    MissingColumn(String),
    /// A listed column allows NULL.
    NullableColumn(String),
    /// More than one `pk` constraint was declared.
    MoreThanOne(usize),
}

impl fmt::Display for PrimaryKeyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "missing column `{}`", column),
            Self::NullableColumn(column) => write!(f, "nullable column `{}`", column),
            Self::MoreThanOne(count) => write!(f, "more than one pk ({} declared)", count),
        }
    }
}

/// Errors raised while building, resolving or validating a schema catalog.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(libra::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A type specification is not a well-formed constructor call.
    #[error("malformed type spec `{src}` at {location}: {message} near `{fragment}` (offset {offset})")]
    #[diagnostic(code(libra::schema::malformed_type_spec))]
    MalformedTypeSpec {
        #[source_code]
        src: String,
        #[label("error here")]
        span: miette::SourceSpan,
        fragment: String,
        offset: usize,
        message: String,
        location: String,
    },

    /// A default value is neither a literal nor a call expression.
    #[error("unresolvable default `{text}` at {location}: {reason}")]
    #[diagnostic(code(libra::schema::unresolvable_default))]
    UnresolvableDefault {
        text: String,
        reason: String,
        location: String,
    },

    /// A record lacks a required field.
    #[error("incomplete {kind} record `{key}`: missing required field `{field}`")]
    #[diagnostic(code(libra::schema::incomplete_record))]
    IncompleteRecord {
        kind: RecordKind,
        key: String,
        field: String,
    },

    /// A record field carries a value of the wrong shape.
    #[error("invalid field `{field}` on {kind} record `{key}`: {message}")]
    #[diagnostic(code(libra::schema::invalid_field))]
    InvalidField {
        kind: RecordKind,
        key: String,
        field: String,
        message: String,
    },

    /// A record was supplied twice while duplicates are rejected.
    #[error("duplicate {kind} record `{key}`")]
    #[diagnostic(code(libra::schema::duplicate_record))]
    DuplicateRecord { kind: RecordKind, key: String },

    /// Records name a schema that has no schema record.
    #[error("unknown schema `{schema}`")]
    #[diagnostic(code(libra::schema::unknown_schema))]
    UnknownSchema { schema: String },

    /// A record names a model that was never declared.
    #[error("unknown model `{model}` in schema `{schema}`")]
    #[diagnostic(code(libra::schema::unknown_model))]
    UnknownModel { schema: String, model: String },

    /// A model references a column with no definition in its schema.
    #[error("unknown column `{column}` referenced by `{schema}`.`{model}`")]
    #[diagnostic(code(libra::schema::unknown_column))]
    UnknownColumn {
        schema: String,
        model: String,
        column: String,
    },

    /// Two associations of one model claim the same position.
    #[error("position {position} of `{schema}`.`{model}` is claimed by both `{first}` and `{second}`")]
    #[diagnostic(code(libra::schema::position_conflict))]
    PositionConflict {
        schema: String,
        model: String,
        position: i64,
        first: String,
        second: String,
    },

    /// Association positions of one model are not contiguous from 0.
    #[error("positions of `{schema}`.`{model}` have a gap: expected {expected}, found {found}")]
    #[diagnostic(code(libra::schema::position_gap))]
    PositionGap {
        schema: String,
        model: String,
        expected: usize,
        found: i64,
    },

    /// The primary key of a model is invalid.
    #[error("invalid primary key on `{schema}`.`{model}`: {reason}")]
    #[diagnostic(code(libra::schema::invalid_primary_key))]
    InvalidPrimaryKey {
        schema: String,
        model: String,
        reason: PrimaryKeyFault,
    },

    /// Two unique constraints cover the same set of columns.
    #[error("duplicate unique constraint on `{schema}`.`{model}` over ({})", .columns.join(", "))]
    #[diagnostic(code(libra::schema::duplicate_unique_constraint))]
    DuplicateUniqueConstraint {
        schema: String,
        model: String,
        columns: Vec<String>,
    },

    /// A foreign key does not point at a key column of a loaded model.
    #[error("dangling foreign key `{reference}` on `{schema}`.`{model}`: {reason}")]
    #[diagnostic(code(libra::schema::dangling_foreign_key))]
    DanglingForeignKey {
        schema: String,
        model: String,
        reference: String,
        reason: String,
    },

    /// A referential action is outside the recognised set.
    #[error("invalid referential action `{action}` for {clause} on `{schema}`.`{model}`")]
    #[diagnostic(
        code(libra::schema::invalid_referential_action),
        help("expected one of CASCADE, SET NULL, RESTRICT, NO ACTION, SET DEFAULT")
    )]
    InvalidReferentialAction {
        schema: String,
        model: String,
        clause: String,
        action: String,
    },

    /// A constraint declaration is structurally unusable.
    #[error("invalid {constraint} constraint on `{schema}`.`{model}`: {message}")]
    #[diagnostic(code(libra::schema::invalid_constraint))]
    InvalidConstraint {
        schema: String,
        model: String,
        constraint: String,
        message: String,
    },

    /// A check constraint carries no SQL text.
    #[error("check constraint {name} on `{schema}`.`{model}` has empty sqltext")]
    #[diagnostic(code(libra::schema::empty_check_constraint))]
    EmptyCheckConstraint {
        schema: String,
        model: String,
        name: String,
    },

    /// Foreign keys form a cycle between schemas.
    #[error("schema `{schema}` is part of a foreign-key cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(code(libra::schema::cyclic_schema_reference))]
    CyclicSchemaReference { schema: String, cycle: Vec<String> },

    /// A schema this one references did not publish.
    #[error("schema `{schema}` depends on `{dependency}`, which failed to build")]
    #[diagnostic(code(libra::schema::dependency_failed))]
    DependencyFailed { schema: String, dependency: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(libra::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(libra::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// YAML parsing error.
    #[error("failed to parse YAML")]
    #[diagnostic(code(libra::schema::yaml_error))]
    YamlError {
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parsing or rendering error.
    #[error("failed to process JSON")]
    #[diagnostic(code(libra::schema::json_error))]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    /// A schema failed with one or more errors.
    #[error("schema `{schema}` failed with {count} error(s)")]
    #[diagnostic(code(libra::schema::validation_failed))]
    ValidationFailed {
        schema: String,
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create a malformed type-spec error pointing at `offset` in `src`.
    pub fn malformed(src: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        let src = src.into();
        let offset = offset.min(src.len());
        let fragment = fragment_at(&src, offset);
        let len = if offset >= src.len() {
            0
        } else {
            fragment.len().clamp(1, src.len() - offset)
        };
        Self::MalformedTypeSpec {
            span: (offset, len).into(),
            fragment,
            offset,
            message: message.into(),
            location: "<input>".to_string(),
            src,
        }
    }

    /// Create an unresolvable-default error.
    pub fn unresolvable_default(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableDefault {
            text: text.into(),
            reason: reason.into(),
            location: "<input>".to_string(),
        }
    }

    /// Attach a record key and field name to a parse error.
    ///
    /// Other variants are returned unchanged.
    pub fn located(mut self, key: &str, field: &str) -> Self {
        if let Self::MalformedTypeSpec { location, .. } | Self::UnresolvableDefault { location, .. } =
            &mut self
        {
            *location = format!("{}.{}", key, field);
        }
        self
    }

    /// Create an incomplete-record error.
    pub fn incomplete(kind: RecordKind, key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::IncompleteRecord {
            kind,
            key: key.into(),
            field: field.into(),
        }
    }

    /// Create an invalid-field error.
    pub fn invalid_field(
        kind: RecordKind,
        key: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            kind,
            key: key.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an unknown-model error.
    pub fn unknown_model(schema: impl Into<String>, model: impl Into<String>) -> Self {
        Self::UnknownModel {
            schema: schema.into(),
            model: model.into(),
        }
    }

    /// Create an unknown-column error.
    pub fn unknown_column(
        schema: impl Into<String>,
        model: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::UnknownColumn {
            schema: schema.into(),
            model: model.into(),
            column: column.into(),
        }
    }

    /// Create an invalid-primary-key error.
    pub fn invalid_primary_key(
        schema: impl Into<String>,
        model: impl Into<String>,
        reason: PrimaryKeyFault,
    ) -> Self {
        Self::InvalidPrimaryKey {
            schema: schema.into(),
            model: model.into(),
            reason,
        }
    }

    /// Create a dangling-foreign-key error.
    pub fn dangling_foreign_key(
        schema: impl Into<String>,
        model: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DanglingForeignKey {
            schema: schema.into(),
            model: model.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-constraint error.
    pub fn invalid_constraint(
        schema: impl Into<String>,
        model: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidConstraint {
            schema: schema.into(),
            model: model.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Bundle the errors of one schema.
    pub fn failed(schema: impl Into<String>, errors: Vec<SchemaError>) -> Self {
        Self::ValidationFailed {
            schema: schema.into(),
            count: errors.len(),
            errors,
        }
    }

    /// The taxonomy bucket of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedTypeSpec { .. } | Self::UnresolvableDefault { .. } => ErrorCategory::Parse,
            Self::IncompleteRecord { .. }
            | Self::InvalidField { .. }
            | Self::DuplicateRecord { .. }
            | Self::UnknownSchema { .. }
            | Self::UnknownModel { .. }
            | Self::UnknownColumn { .. }
            | Self::PositionConflict { .. }
            | Self::PositionGap { .. } => ErrorCategory::Structural,
            Self::InvalidPrimaryKey { .. }
            | Self::DuplicateUniqueConstraint { .. }
            | Self::DanglingForeignKey { .. }
            | Self::InvalidReferentialAction { .. }
            | Self::InvalidConstraint { .. }
            | Self::EmptyCheckConstraint { .. }
            | Self::CyclicSchemaReference { .. }
            | Self::DependencyFailed { .. } => ErrorCategory::Integrity,
            Self::ValidationFailed { errors, .. } => errors
                .first()
                .map(SchemaError::category)
                .unwrap_or(ErrorCategory::Integrity),
            Self::IoError { .. }
            | Self::ConfigError { .. }
            | Self::TomlError { .. }
            | Self::YamlError { .. }
            | Self::JsonError { .. } => ErrorCategory::Input,
        }
    }
}

/// The token starting at `offset`, or a marker for end of input.
fn fragment_at(src: &str, offset: usize) -> String {
    let rest = src.get(offset..).unwrap_or("");
    let token: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | '='))
        .collect();
    if !token.is_empty() {
        token
    } else if let Some(c) = rest.chars().next() {
        c.to_string()
    } else {
        "<end of input>".to_string()
    }
}

/// Non-fatal findings returned next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// A later record replaced an earlier one with the same key.
    OverwriteNotice {
        schema: String,
        kind: RecordKind,
        key: String,
    },
    /// A keyword argument appeared more than once; the last value was kept.
    DuplicateKeywordArg { spec: String, keyword: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverwriteNotice { schema, kind, key } => {
                write!(f, "{} record `{}` in schema `{}` was overwritten", kind, key, schema)
            }
            Self::DuplicateKeywordArg { spec, keyword } => {
                write!(f, "keyword `{}` repeated in `{}`; last value kept", keyword, spec)
            }
        }
    }
}

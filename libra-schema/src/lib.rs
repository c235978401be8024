//! # libra-schema
//!
//! Schema metadata engine for the Libra schema-schema.
//!
//! This crate provides:
//! - A parser for type specifications such as `Numeric(10, 2)` or
//!   `Float(precision=53, asdecimal=True)`
//! - Default-value classification into literals and deferred calls
//! - Record sources for in-memory batches, hierarchical documents and the
//!   persisted schema-schema tables
//! - Catalog ingestion, association resolution and constraint validation
//! - Dependency-ordered builds across schemas with per-schema publication
//! - Configuration parsing for `libra.toml` files
//!
//! ## Example
//!
//! ```rust,ignore
//! use libra_schema::{DocumentSource, Engine, EngineConfig, SchemaSelector};
//!
//! let config = EngineConfig::from_file("libra.toml")?;
//! let source = DocumentSource::from_file("schemas/libra.json")?;
//!
//! let report = Engine::new(config).build_from_sources(&[&source], &SchemaSelector::All)?;
//! for (name, schema) in &report.published {
//!     println!("{}: {}", name, schema.to_json()?);
//! }
//! ```

pub mod ast;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod parser;
pub mod resolver;
pub mod source;
pub mod typemap;
pub mod validator;

pub use ast::*;
pub use catalog::{Catalog, CatalogBuilder, ConstraintKind, ConstraintSlot};
pub use config::{DuplicatePolicy, EngineConfig};
pub use descriptor::{ModelDescriptor, SchemaDescriptor};
pub use engine::{BuildReport, Engine};
pub use error::{Notice, SchemaError, SchemaResult};
pub use evaluator::{DefaultEvaluator, classify_default};
pub use parser::{parse_default_expr, parse_type_spec};
pub use resolver::ResolvedColumn;
pub use source::{
    DocumentSource, RawRecord, RecordBatch, RecordKind, RecordSource, SchemaSelector,
    TableNames, TableRowSource,
};
pub use typemap::TypeMap;
pub use validator::{Constraint, ReferentialAction};

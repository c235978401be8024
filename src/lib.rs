//! # Libra
//!
//! A self-describing catalog of relational schema metadata.
//!
//! Libra provides:
//! - A parser for constructor-style type specifications
//! - Ingestion of schema-schema records from batches, documents and tables
//! - Per-model column resolution with position and override checks
//! - Primary-key, unique, foreign-key and check constraint validation
//! - Dependency-ordered builds that publish each schema all-or-nothing
//!
//! ## Quick Start
//!
//! ```rust
//! use libra::prelude::*;
//!
//! let source = DocumentSource::from_json_str(r#"{
//!     "Libra": {
//!         "columns": {
//!             "id": { "type_spec": "Integer" },
//!             "label": { "type_spec": "String(30)", "default_val": "-" }
//!         },
//!         "models": {
//!             "account": {
//!                 "columns": [{ "id": { "nullable": false } }, "label"],
//!                 "constraints": [{ "pk": ["id"] }]
//!             }
//!         }
//!     }
//! }"#).unwrap();
//!
//! let engine = Engine::new(EngineConfig::default());
//! let report = engine.build_from_sources(&[&source], &SchemaSelector::All).unwrap();
//!
//! let account = report.schema("Libra").unwrap().model("account").unwrap();
//! assert_eq!(account.columns[1].descriptor.to_string(), "String(30)");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Type specs, catalogs, resolution, validation and build orchestration.
pub mod schema {
    pub use libra_schema::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::schema::{
        BuildReport, DocumentSource, Engine, EngineConfig, RawRecord, RecordBatch, RecordKind,
        RecordSource, SchemaDescriptor, SchemaSelector, TableRowSource, parse_type_spec,
    };
}

// Re-export key types at the crate root
pub use schema::{Engine, SchemaError, SchemaResult};

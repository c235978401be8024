//! Build orchestration.
//!
//! The [`Engine`] runs a record batch through every stage: grouping by
//! schema, catalog ingestion, association resolution, dependency planning
//! and constraint validation. Each schema is published all-or-nothing; a
//! failing schema never stops unrelated schemas from publishing.
//!
//! ## Example
//!
//! ```rust
//! use libra_schema::{Engine, EngineConfig, RawRecord, RecordKind};
//!
//! let records = vec![
//!     RawRecord::new(RecordKind::Schema).with("schema_name", "Libra"),
//!     RawRecord::new(RecordKind::Model)
//!         .with("schema_name", "Libra")
//!         .with("model_name", "account"),
//!     RawRecord::new(RecordKind::Column)
//!         .with("schema_name", "Libra")
//!         .with("column_name", "id")
//!         .with("type_spec", "Integer"),
//!     RawRecord::new(RecordKind::Association)
//!         .with("schema_name", "Libra")
//!         .with("model_name", "account")
//!         .with("column_name", "id")
//!         .with("position", 0)
//!         .with("nullable", false)
//!         .with("autoincrement", "auto"),
//! ];
//!
//! let report = Engine::new(EngineConfig::default()).build(records).unwrap();
//! assert!(report.is_success());
//! assert_eq!(report.schema("Libra").unwrap().models[0].columns.len(), 1);
//! ```

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::cache::TypeSpecCache;
use crate::catalog::{Catalog, CatalogBuilder, group_by_schema};
use crate::config::EngineConfig;
use crate::descriptor::SchemaDescriptor;
use crate::error::{Notice, SchemaError, SchemaResult};
use crate::graph::SchemaGraph;
use crate::resolver::{AssociationResolver, ResolvedSchema};
use crate::source::{RawRecord, RecordSource, SchemaSelector, select};
use crate::validator::{ConstraintValidator, ReferenceIndex};

/// Outcome of one build.
#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    /// Schemas that passed every stage, ordered by name.
    pub published: IndexMap<SmolStr, SchemaDescriptor>,
    /// Schemas that did not publish, with every error found, ordered by name.
    #[serde(serialize_with = "serialize_failures")]
    pub failed: IndexMap<SmolStr, Vec<SchemaError>>,
    /// Advisories gathered along the way.
    pub notices: Vec<Notice>,
}

impl BuildReport {
    /// Whether every schema published.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// A published schema.
    pub fn schema(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.published.get(name)
    }

    /// The errors of a failed schema.
    pub fn errors(&self, name: &str) -> Option<&[SchemaError]> {
        self.failed.get(name).map(Vec::as_slice)
    }

    /// Published schemas, or one bundled error per failed schema.
    pub fn into_result(self) -> Result<IndexMap<SmolStr, SchemaDescriptor>, Vec<SchemaError>> {
        if self.failed.is_empty() {
            Ok(self.published)
        } else {
            Err(self
                .failed
                .into_iter()
                .map(|(schema, errors)| SchemaError::failed(schema.as_str(), errors))
                .collect())
        }
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| SchemaError::JsonError { source })
    }

    fn fail(&mut self, schema: &SmolStr, errors: impl IntoIterator<Item = SchemaError>) {
        let entry = self.failed.entry(schema.clone()).or_default();
        entry.extend(errors);
        warn!(schema = %schema, errors = entry.len(), "schema failed");
    }
}

fn serialize_failures<S: Serializer>(
    failed: &IndexMap<SmolStr, Vec<SchemaError>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(failed.iter().map(|(schema, errors)| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        (schema, messages)
    }))
}

/// The schema metadata engine.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    resolver: AssociationResolver,
    cache: TypeSpecCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            resolver: AssociationResolver::new(config.type_map()),
            cache: TypeSpecCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The type-spec cache shared by every build of this engine.
    pub fn cache(&self) -> &TypeSpecCache {
        &self.cache
    }

    /// Gather records from `sources` in order and build them.
    ///
    /// Records from later sources replace earlier ones with the same key.
    pub fn build_from_sources(
        &self,
        sources: &[&dyn RecordSource],
        selector: &SchemaSelector,
    ) -> SchemaResult<BuildReport> {
        let mut records = Vec::new();
        for source in sources {
            let batch = source.records(selector)?;
            debug!(source = %source.describe(), records = batch.len(), "read source");
            records.extend(select(batch, selector));
        }
        self.build(records)
    }

    /// Build every schema present in `records`.
    ///
    /// Only a record that names no schema fails the whole build; every other
    /// problem is reported per schema in the returned [`BuildReport`].
    pub fn build(&self, records: impl IntoIterator<Item = RawRecord>) -> SchemaResult<BuildReport> {
        let groups = group_by_schema(records)?;
        info!(schemas = groups.len(), "building schemas");

        let mut report = BuildReport::default();

        // Ingest
        let builder = CatalogBuilder::new(
            self.config.ingest.duplicate_policy,
            self.config.evaluator(),
            &self.cache,
        );
        let groups: Vec<_> = groups.into_iter().collect();
        let ingested = self.fan_out(&groups, |(schema, records)| builder.build_schema(schema, records));

        let mut catalogs: Vec<Catalog> = Vec::with_capacity(groups.len());
        for ((schema, _), outcome) in groups.iter().zip(ingested) {
            match outcome {
                Ok(ingested) => {
                    report.notices.extend(ingested.notices);
                    catalogs.push(ingested.catalog);
                }
                Err(errors) => report.fail(schema, errors),
            }
        }

        // Resolve
        let index = ReferenceIndex::from_catalogs(&catalogs);
        let resolved_all = self.fan_out(&catalogs, |catalog| self.resolver.resolve(catalog));
        let mut resolved: IndexMap<SmolStr, ResolvedSchema> = IndexMap::new();
        for (catalog, outcome) in catalogs.iter().zip(resolved_all) {
            match outcome {
                Ok(schema) => {
                    resolved.insert(catalog.name.clone(), schema);
                }
                Err(errors) => report.fail(&catalog.name, errors),
            }
        }

        // Plan
        let graph = SchemaGraph::from_catalogs(&catalogs, &index);
        let plan = graph.plan()?;
        for cycle in &plan.cycles {
            let names: Vec<String> = cycle.iter().map(SmolStr::to_string).collect();
            for schema in cycle {
                resolved.shift_remove(schema);
                let error = SchemaError::CyclicSchemaReference {
                    schema: schema.to_string(),
                    cycle: names.clone(),
                };
                report.fail(schema, [error]);
            }
        }

        // Validate, level by level
        let validator = ConstraintValidator::new(&index);
        for level in &plan.levels {
            let mut ready = Vec::new();
            for name in level {
                let Some(schema) = resolved.shift_remove(name) else {
                    continue;
                };
                let blocked: Vec<_> = graph
                    .dependencies(name)
                    .into_iter()
                    .filter(|dep| !report.published.contains_key(dep))
                    .map(|dep| SchemaError::DependencyFailed {
                        schema: name.to_string(),
                        dependency: dep.to_string(),
                    })
                    .collect();
                if blocked.is_empty() {
                    ready.push(schema);
                } else {
                    report.fail(name, blocked);
                }
            }

            let outcomes = self.fan_out(&ready, |schema| validator.validate(schema));
            for (schema, outcome) in ready.into_iter().zip(outcomes) {
                let name = schema.name.clone();
                match outcome {
                    Ok(constraints) => {
                        let descriptor =
                            SchemaDescriptor::assemble(schema, constraints, &self.config.naming);
                        debug!(schema = %name, models = descriptor.models.len(), "published schema");
                        report.published.insert(name, descriptor);
                    }
                    Err(errors) => report.fail(&name, errors),
                }
            }
        }

        report.published.sort_keys();
        report.failed.sort_keys();
        info!(
            published = report.published.len(),
            failed = report.failed.len(),
            notices = report.notices.len(),
            "build finished"
        );
        Ok(report)
    }

    /// Map `f` over `items`, in parallel when configured.
    fn fan_out<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if self.config.build.parallel && items.len() > 1 {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }
}

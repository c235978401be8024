//! Cross-schema dependency ordering.
//!
//! A schema depends on another when one of its foreign keys points there.
//! Schemas are validated level by level: every dependency of a schema sits in
//! a lower level, and schemas within a level are independent of each other.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use petgraph::algo::{condensation, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use smol_str::SmolStr;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{SchemaError, SchemaResult};
use crate::validator::ReferenceIndex;

/// Schemas and the cross-schema edges between them.
///
/// Edges run from the dependent schema to its dependency.
#[derive(Debug, Default)]
pub struct SchemaGraph {
    graph: DiGraph<SmolStr, ()>,
    nodes: IndexMap<SmolStr, NodeIndex>,
}

/// Processing order derived from a [`SchemaGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    /// Acyclic schemas grouped by level, dependencies first.
    pub levels: Vec<Vec<SmolStr>>,
    /// Each cycle's members, sorted.
    pub cycles: Vec<Vec<SmolStr>>,
}

impl BuildPlan {
    /// The cycle containing `schema`, if any.
    pub fn cycle_of(&self, schema: &str) -> Option<&[SmolStr]> {
        self.cycles
            .iter()
            .find(|cycle| cycle.iter().any(|s| s == schema))
            .map(Vec::as_slice)
    }
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from catalogs, locating foreign keys through `index`.
    ///
    /// References that cannot be located add no edge; the validator reports
    /// them.
    pub fn from_catalogs<'a>(
        catalogs: impl IntoIterator<Item = &'a Catalog>,
        index: &ReferenceIndex,
    ) -> Self {
        let mut graph = Self::new();
        for catalog in catalogs {
            graph.add_schema(&catalog.name);
            for (_, reference) in catalog.references() {
                if let Ok(target) = index.locate(&catalog.name, reference) {
                    graph.add_dependency(&catalog.name, &target.schema);
                }
            }
        }
        graph
    }

    /// Add a schema with no edges. Adding it twice is a no-op.
    pub fn add_schema(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.nodes.get(name) {
            return node;
        }
        let name = SmolStr::new(name);
        let node = self.graph.add_node(name.clone());
        self.nodes.insert(name, node);
        node
    }

    /// Record that `dependent` references `dependency`.
    ///
    /// Edges within one schema are ignored.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_schema(dependent);
        if dependent == dependency {
            return;
        }
        let to = self.add_schema(dependency);
        self.graph.update_edge(from, to, ());
    }

    /// The schemas `name` directly depends on, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<SmolStr> {
        let Some(&node) = self.nodes.get(name) else {
            return Vec::new();
        };
        let deps: BTreeSet<_> = self
            .graph
            .neighbors(node)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.into_iter().collect()
    }

    /// Group schemas into levels and pick out cycles.
    pub fn plan(&self) -> SchemaResult<BuildPlan> {
        let condensed = condensation(self.graph.clone(), true);

        // Dependents come before dependencies in topological order.
        let order = toposort(&condensed, None).map_err(|cycle| {
            let schema = condensed[cycle.node_id()]
                .first()
                .map(SmolStr::to_string)
                .unwrap_or_default();
            SchemaError::CyclicSchemaReference {
                cycle: vec![schema.clone()],
                schema,
            }
        })?;

        let mut level = vec![0usize; condensed.node_count()];
        for &node in order.iter().rev() {
            level[node.index()] = condensed
                .neighbors(node)
                .map(|dep| level[dep.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut plan = BuildPlan::default();
        for node in condensed.node_indices() {
            let mut members = condensed[node].clone();
            members.sort();
            if members.len() > 1 {
                plan.cycles.push(members);
                continue;
            }
            let at = level[node.index()];
            if plan.levels.len() <= at {
                plan.levels.resize_with(at + 1, Vec::new);
            }
            plan.levels[at].extend(members);
        }
        for level in &mut plan.levels {
            level.sort();
        }
        plan.levels.retain(|level| !level.is_empty());
        plan.cycles.sort();

        debug!(
            schemas = self.nodes.len(),
            levels = plan.levels.len(),
            cycles = plan.cycles.len(),
            "planned schema order"
        );
        Ok(plan)
    }
}

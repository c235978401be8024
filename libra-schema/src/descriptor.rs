//! Published schema descriptors.
//!
//! A [`SchemaDescriptor`] is the only thing handed to model synthesis: plain
//! data, ordered and serialisable, with no reference back into the engine.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use smol_str::SmolStr;

use crate::catalog::ConstraintKind;
use crate::config::NamingConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::resolver::{ResolvedColumn, ResolvedSchema};
use crate::validator::Constraint;

/// One validated model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub name: SmolStr,
    pub table_name: String,
    pub description: Option<String>,
    pub columns: Vec<ResolvedColumn>,
    pub constraints: Vec<Constraint>,
}

impl ModelDescriptor {
    pub fn column(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key constraint, if one was declared.
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }
}

/// One validated schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescriptor {
    pub name: SmolStr,
    pub description: Option<String>,
    pub audit: IndexMap<String, JsonValue>,
    pub models: Vec<ModelDescriptor>,
}

impl SchemaDescriptor {
    /// Assemble a descriptor from a resolved schema and its validated
    /// constraints.
    pub fn assemble(
        schema: ResolvedSchema,
        mut constraints: Vec<(SmolStr, Vec<Constraint>)>,
        naming: &NamingConfig,
    ) -> Self {
        let models = schema
            .models
            .into_iter()
            .map(|model| {
                let validated = constraints
                    .iter()
                    .position(|(name, _)| *name == model.name)
                    .map(|at| constraints.swap_remove(at).1)
                    .unwrap_or_default();
                ModelDescriptor {
                    table_name: naming.table_name(&model.name),
                    name: model.name,
                    description: model.description,
                    columns: model.columns,
                    constraints: validated,
                }
            })
            .collect();

        Self {
            name: schema.name,
            description: schema.meta.description,
            audit: schema.meta.audit,
            models,
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| SchemaError::JsonError { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeDescriptor;
    use crate::catalog::{AutoIncrement, SchemaMeta};
    use crate::resolver::ResolvedModel;

    fn resolved() -> ResolvedSchema {
        let column = ResolvedColumn {
            name: "id".into(),
            alias: Some("identifier".into()),
            position: 0,
            type_spec: "Integer".into(),
            descriptor: TypeDescriptor::new("Integer"),
            nullable: false,
            default: None,
            autoincrement: AutoIncrement::True,
            onupdate: None,
            quote: None,
            info: IndexMap::new(),
            description: None,
        };
        ResolvedSchema {
            name: "Libra".into(),
            meta: SchemaMeta {
                name: "Libra".into(),
                description: Some("meta".into()),
                audit: IndexMap::new(),
            },
            models: vec![ResolvedModel {
                name: "account".into(),
                description: None,
                columns: vec![column],
                constraints: Vec::new(),
            }],
        }
    }

    fn pk() -> Constraint {
        Constraint {
            kind: ConstraintKind::PrimaryKey,
            name: None,
            columns: vec!["id".into()],
            foreign_key: None,
            sqltext: None,
            deferrable: None,
            initially: None,
        }
    }

    #[test]
    fn test_assemble_applies_table_naming() {
        let naming = NamingConfig {
            prefix: "t_".into(),
            ..Default::default()
        };
        let descriptor =
            SchemaDescriptor::assemble(resolved(), vec![("account".into(), vec![pk()])], &naming);

        let account = descriptor.model("account").unwrap();
        assert_eq!(account.table_name, "t_account");
        assert_eq!(account.primary_key().unwrap().columns, vec!["id"]);
        assert_eq!(account.column("id").unwrap().alias.as_deref(), Some("identifier"));
        assert_eq!(descriptor.description.as_deref(), Some("meta"));
    }

    #[test]
    fn test_json_rendering() {
        let descriptor = SchemaDescriptor::assemble(
            resolved(),
            vec![("account".into(), vec![pk()])],
            &NamingConfig::default(),
        );
        let json = descriptor.to_json().unwrap();
        let value: JsonValue = serde_json::from_str(&json).unwrap();

        assert_eq!(value["name"], "Libra");
        let column = &value["models"][0]["columns"][0];
        assert_eq!(column["descriptor"]["base_type"], "Integer");
        assert_eq!(column["autoincrement"], "true");
        assert_eq!(value["models"][0]["constraints"][0]["kind"], "primary_key");
        assert_eq!(descriptor.to_json().unwrap(), json);
    }
}

//! Configuration file parsing for `libra.toml`.
//!
//! Every section is optional:
//!
//! ```toml
//! [ingest]
//! duplicate_policy = "error"
//! null_markers = ["None", "-"]
//!
//! [build]
//! parallel = true
//!
//! [naming]
//! namespace = "${LIBRA_NAMESPACE}"
//! prefix = "t_"
//!
//! [naming.tables]
//! testmodel1 = "test_model_one"
//!
//! [types.overrides]
//! String = "VARCHAR2"
//!
//! [tables]
//! columnassoc = "column_assoc"
//!
//! [environments.ci.ingest]
//! duplicate_policy = "overwrite"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{SchemaError, SchemaResult};
use crate::evaluator::{DEFAULT_NULL_MARKERS, DefaultEvaluator};
use crate::source::{TableNames, TableRowSource};
use crate::typemap::TypeMap;

/// Main configuration structure for `libra.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Record ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Build orchestration settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Table-name derivation for published models.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Base-type remapping.
    #[serde(default)]
    pub types: TypesConfig,

    /// Names of the persisted schema-schema tables.
    #[serde(default)]
    pub tables: TableNames,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl EngineConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content)?;

        toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(ingest) = overrides.ingest {
                if let Some(policy) = ingest.duplicate_policy {
                    self.ingest.duplicate_policy = policy;
                }
                if let Some(markers) = ingest.null_markers {
                    self.ingest.null_markers = markers;
                }
            }
            if let Some(build) = overrides.build {
                if let Some(parallel) = build.parallel {
                    self.build.parallel = parallel;
                }
            }
            if let Some(naming) = overrides.naming {
                if let Some(namespace) = naming.namespace {
                    self.naming.namespace = Some(namespace);
                }
                if let Some(prefix) = naming.prefix {
                    self.naming.prefix = prefix;
                }
                if let Some(suffix) = naming.suffix {
                    self.naming.suffix = suffix;
                }
            }
        }
        self
    }

    /// The type map with configured overrides applied.
    pub fn type_map(&self) -> TypeMap {
        TypeMap::with_overrides(
            self.types
                .overrides
                .iter()
                .map(|(name, target)| (name.as_str(), target.as_str())),
        )
    }

    /// A default-value evaluator using the configured null markers.
    pub fn evaluator(&self) -> DefaultEvaluator {
        DefaultEvaluator::new(self.ingest.null_markers.iter().cloned())
    }

    /// An empty table-row source using the configured table names.
    pub fn table_source(&self) -> TableRowSource {
        TableRowSource::new(self.tables.clone())
            .with_null_markers(self.ingest.null_markers.iter().cloned())
    }
}

/// What to do when two records share a primary key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the later record and emit a notice.
    #[default]
    Overwrite,
    /// Fail the schema with `DuplicateRecord`.
    #[serde(alias = "error_on_duplicate")]
    Error,
}

/// Record ingestion settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Text treated as the null-equivalent default.
    #[serde(default = "default_null_markers")]
    pub null_markers: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            null_markers: default_null_markers(),
        }
    }
}

fn default_null_markers() -> Vec<String> {
    DEFAULT_NULL_MARKERS.iter().map(|m| m.to_string()).collect()
}

/// Build orchestration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Build independent schemas on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

fn default_true() -> bool {
    true
}

/// Table-name derivation for published models.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// Prepended as `namespace.` to every table name.
    pub namespace: Option<String>,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub suffix: String,

    /// Explicit model -> table names; prefix and suffix do not apply.
    #[serde(default)]
    pub tables: IndexMap<String, String>,
}

impl NamingConfig {
    /// The table name for `model`.
    pub fn table_name(&self, model: &str) -> String {
        let bare = match self.tables.get(model) {
            Some(explicit) => explicit.clone(),
            None => format!("{}{}{}", self.prefix, model, self.suffix),
        };
        match self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            Some(ns) => format!("{}.{}", ns, bare),
            None => bare,
        }
    }
}

/// Base-type remapping.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TypesConfig {
    /// `from = "to"` pairs applied to parsed base types.
    #[serde(default)]
    pub overrides: IndexMap<String, String>,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    pub ingest: Option<IngestOverride>,
    pub build: Option<BuildOverride>,
    pub naming: Option<NamingOverride>,
}

/// Ingestion overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestOverride {
    pub duplicate_policy: Option<DuplicatePolicy>,
    pub null_markers: Option<Vec<String>>,
}

/// Build overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOverride {
    pub parallel: Option<bool>,
}

/// Naming overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamingOverride {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

/// Expand `${VAR}` references; unset variables are left as written.
fn expand_env_vars(content: &str) -> SchemaResult<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").map_err(|e| SchemaError::ConfigError {
        message: e.to_string(),
    })?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}

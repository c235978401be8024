//! Base-type vocabulary and remapping.
//!
//! The map starts as the identity over the known generic (CamelCase) and
//! SQL-standard (UPPERCASE) type names. Overrides point a name at another
//! target, e.g. `String -> VARCHAR2` for a dialect that needs it. Targets stay
//! unique: assigning a target that another name already maps to moves it.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::ast::TypeDescriptor;

/// Generic type names.
pub const GENERIC_TYPES: &[&str] = &[
    "BigInteger",
    "Boolean",
    "Date",
    "DateTime",
    "Enum",
    "Double",
    "Float",
    "Integer",
    "Interval",
    "LargeBinary",
    "Numeric",
    "PickleType",
    "SmallInteger",
    "String",
    "Text",
    "Time",
    "Unicode",
    "UnicodeText",
    "Uuid",
];

/// SQL-standard and multi-vendor type names.
pub const SQL_TYPES: &[&str] = &[
    "ARRAY",
    "BIGINT",
    "BINARY",
    "BLOB",
    "BOOLEAN",
    "CHAR",
    "CLOB",
    "DATE",
    "DATETIME",
    "DECIMAL",
    "DOUBLE",
    "DOUBLE_PRECISION",
    "FLOAT",
    "INT",
    "JSON",
    "INTEGER",
    "NCHAR",
    "NVARCHAR",
    "NUMERIC",
    "REAL",
    "SMALLINT",
    "TEXT",
    "TIME",
    "TIMESTAMP",
    "UUID",
    "VARBINARY",
    "VARCHAR",
];

/// Mapping from type names to the name a descriptor should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    mapping: IndexMap<SmolStr, SmolStr>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let mapping = GENERIC_TYPES
            .iter()
            .chain(SQL_TYPES)
            .map(|name| (SmolStr::new(name), SmolStr::new(name)))
            .collect();
        Self { mapping }
    }
}

impl TypeMap {
    /// The built-in vocabulary with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in vocabulary with `overrides` applied in order.
    pub fn with_overrides<'a>(overrides: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = Self::new();
        for (name, target) in overrides {
            map.set(name, target);
        }
        map
    }

    /// Point `name` at `target`, dropping any other name that mapped there.
    pub fn set(&mut self, name: &str, target: &str) {
        self.mapping
            .retain(|k, v| k.as_str() == name || v.as_str() != target);
        self.mapping.insert(SmolStr::new(name), SmolStr::new(target));
    }

    /// The target of `name`, if the map knows it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.mapping.get(name).map(SmolStr::as_str)
    }

    /// Names that map to `target`.
    pub fn names_for(&self, target: &str) -> Vec<&str> {
        self.mapping
            .iter()
            .filter(|(_, v)| v.as_str() == target)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Whether `name` is part of the map.
    pub fn is_known(&self, name: &str) -> bool {
        self.mapping.contains_key(name)
    }

    /// Apply the map to a descriptor's base type.
    ///
    /// Unknown names pass through unchanged; arguments are kept as is.
    pub fn apply(&self, descriptor: &TypeDescriptor) -> TypeDescriptor {
        match self.get(&descriptor.base_type) {
            Some(target) if target != descriptor.base_type.as_str() => descriptor.renamed(target),
            _ => descriptor.clone(),
        }
    }
}

//! Structured form of a type specification string.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::Value;

/// A parsed constructor call such as `Float(precision = 53, asdecimal = True)`.
///
/// Positional arguments keep their order. Keyword arguments form a mapping;
/// equality ignores keyword order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// The called identifier, e.g. `Float` or `datetime.now`.
    pub base_type: SmolStr,
    /// Positional arguments in source order.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments; a repeated keyword keeps its last value.
    #[serde(default)]
    pub kwargs: IndexMap<SmolStr, Value>,
}

impl TypeDescriptor {
    /// Create a descriptor with no arguments.
    pub fn new(base_type: impl Into<SmolStr>) -> Self {
        Self {
            base_type: base_type.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Set a keyword argument.
    pub fn with_kwarg(mut self, name: impl Into<SmolStr>, value: Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    /// Get a positional argument by index.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Get a keyword argument by name.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Whether the descriptor carries no arguments at all.
    pub fn is_bare(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Return a copy with a different base type and the same arguments.
    pub fn renamed(&self, base_type: impl Into<SmolStr>) -> Self {
        Self {
            base_type: base_type.into(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_type)?;
        if self.is_bare() {
            return Ok(());
        }

        f.write_str("(")?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
            first = false;
        }
        for (name, value) in &self.kwargs {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        f.write_str(")")
    }
}

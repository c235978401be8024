//! Classified column default values.

use std::fmt;

use serde::Serialize;

use super::{TypeDescriptor, Value};

/// A value resolved once, when the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// The null-equivalent marker.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Whether this is the null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// An unevaluated call carried through to the consumer.
///
/// The engine never invokes it; binding the callable identifier is the
/// caller's business, and it is expected to be evaluated once per use.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct DeferredExpr(TypeDescriptor);

impl DeferredExpr {
    pub(crate) fn new(call: TypeDescriptor) -> Self {
        Self(call)
    }

    /// The dotted identifier of the callable, e.g. `datetime.now`.
    pub fn callable(&self) -> &str {
        &self.0.base_type
    }

    /// Positional arguments of the call.
    pub fn args(&self) -> &[Value] {
        &self.0.args
    }

    /// The call in descriptor form.
    pub fn call(&self) -> &TypeDescriptor {
        &self.0
    }
}

impl fmt::Display for DeferredExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A call with no arguments still renders its parentheses.
        if self.0.is_bare() {
            write!(f, "{}()", self.0.base_type)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Classification of a column's `default_val`.
///
/// Deliberately not `PartialEq`: a deferred expression yields a fresh value
/// on every use.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "classification", rename_all = "snake_case")]
pub enum DefaultValue {
    Literal { value: Literal },
    Deferred { expression: DeferredExpr },
}

impl DefaultValue {
    /// Get the literal, if this default is one.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal { value } => Some(value),
            Self::Deferred { .. } => None,
        }
    }

    /// Get the deferred expression, if this default is one.
    pub fn as_deferred(&self) -> Option<&DeferredExpr> {
        match self {
            Self::Deferred { expression } => Some(expression),
            Self::Literal { .. } => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

impl From<Literal> for DefaultValue {
    fn from(value: Literal) -> Self {
        Self::Literal { value }
    }
}

impl From<DeferredExpr> for DefaultValue {
    fn from(expression: DeferredExpr) -> Self {
        Self::Deferred { expression }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => write!(f, "{}", value),
            Self::Deferred { expression } => write!(f, "{}", expression),
        }
    }
}

//! Argument values inside a type specification.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TypeDescriptor;

/// A positional or keyword argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A boolean literal (`True`/`False`, either case).
    Bool(bool),
    /// A quoted string, stored as the text between the quotes.
    ///
    /// Doubled-quote escapes (`''`) are kept as written.
    String(String),
    /// A nested constructor call, or a bare (possibly dotted) identifier.
    Call(TypeDescriptor),
}

impl Value {
    /// Try to get the value as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get the value as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as a nested call.
    pub fn as_call(&self) -> Option<&TypeDescriptor> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Try to get the value as a bare identifier such as `timezone.utc`.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Call(call) if call.is_bare() => Some(call.base_type.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::String(s) => {
                if has_lone_quote(s, '\'') {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "'{}'", s)
                }
            }
            Self::Call(call) => write!(f, "{}", call),
        }
    }
}

/// Whether `quote` occurs in `text` other than as a doubled escape.
fn has_lone_quote(text: &str, quote: char) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
            } else {
                return true;
            }
        }
    }
    false
}

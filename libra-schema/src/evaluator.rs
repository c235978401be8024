//! Classification of default-value text into literals and deferred calls.

use serde_json::Value as JsonValue;
use tracing::trace;

use crate::ast::{DefaultValue, DeferredExpr, Literal, Value};
use crate::error::{Notice, SchemaError, SchemaResult};
use crate::parser::parse_default_expr;

/// Markers treated as the null-equivalent default when no configuration says
/// otherwise.
pub const DEFAULT_NULL_MARKERS: &[&str] = &["None", "-"];

/// Classify default text with the default null markers.
pub fn classify_default(text: &str) -> SchemaResult<DefaultValue> {
    DefaultEvaluator::default().classify(text, &mut Vec::new())
}

/// Classifies raw `default_val` / `onupdate` fields.
#[derive(Debug, Clone)]
pub struct DefaultEvaluator {
    null_markers: Vec<String>,
}

impl Default for DefaultEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl DefaultEvaluator {
    /// Create an evaluator recognising the given null markers.
    pub fn new(null_markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            null_markers: null_markers.into_iter().collect(),
        }
    }

    /// Whether `text` is one of the null markers.
    pub fn is_null_marker(&self, text: &str) -> bool {
        let text = text.trim();
        self.null_markers.iter().any(|m| m == text)
    }

    /// Classify default text.
    ///
    /// Literals are resolved here. A call expression is kept unevaluated.
    /// Anything else fails with [`SchemaError::UnresolvableDefault`].
    pub fn classify(&self, text: &str, notices: &mut Vec<Notice>) -> SchemaResult<DefaultValue> {
        if self.is_null_marker(text) {
            return Ok(Literal::Null.into());
        }

        let (value, found) = parse_default_expr(text.trim()).map_err(|e| {
            let reason = match e {
                SchemaError::MalformedTypeSpec {
                    message, offset, ..
                } => format!("not a literal or call expression ({} at offset {})", message, offset),
                other => other.to_string(),
            };
            SchemaError::unresolvable_default(text, reason)
        })?;
        notices.extend(found);

        let classified = match value {
            Value::Int(i) => Literal::Int(i).into(),
            Value::Float(f) => Literal::Float(f).into(),
            Value::Bool(b) => Literal::Bool(b).into(),
            Value::String(s) => Literal::String(s).into(),
            Value::Call(call) => DeferredExpr::new(call).into(),
        };
        trace!(text, default = %classified, "classified default");

        Ok(classified)
    }

    /// Classify a raw record field.
    ///
    /// JSON `null` means "no default". Numbers and booleans are literals
    /// already; strings go through [`DefaultEvaluator::classify`].
    pub fn classify_json(
        &self,
        raw: &JsonValue,
        notices: &mut Vec<Notice>,
    ) -> SchemaResult<Option<DefaultValue>> {
        match raw {
            JsonValue::Null => Ok(None),
            JsonValue::Bool(b) => Ok(Some(Literal::Bool(*b).into())),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Some(Literal::Int(i).into())),
                None => n
                    .as_f64()
                    .map(|f| Some(Literal::Float(f).into()))
                    .ok_or_else(|| {
                        SchemaError::unresolvable_default(n.to_string(), "number out of range")
                    }),
            },
            JsonValue::String(text) => self.classify(text, notices).map(Some),
            other => Err(SchemaError::unresolvable_default(
                other.to_string(),
                "expected text, number or boolean",
            )),
        }
    }
}

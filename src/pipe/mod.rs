//! Pipe expression engine
//!
//! Conditions and data mappings are both "pipe" expressions: a row/cell
//! construct where row 0 seeds a carry set and every later row applies a
//! catalog function to it. Cells are literals, `{path}` dynamic references
//! resolved against the job's symbol table, or `{@category.name}` function
//! references.

pub mod interpreter;
pub mod resolver;

pub use interpreter::Interpreter;
pub use resolver::SymbolTable;

use serde_json::Value as JsonValue;

/// A resolved expression value. JSON has no `undefined`, but an unresolved
/// dynamic reference must stay distinguishable from an explicit null;
/// callers decide whether undefined is acceptable.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Undefined,
    Defined(JsonValue),
}

impl Val {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Val::Undefined)
    }

    /// Undefined coerces to null at JSON boundaries.
    pub fn into_json(self) -> JsonValue {
        match self {
            Val::Undefined => JsonValue::Null,
            Val::Defined(v) => v,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Val::Undefined => None,
            Val::Defined(v) => Some(v),
        }
    }

    /// JavaScript-style truthiness: false, null, undefined, 0, "" and NaN
    /// are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined => false,
            Val::Defined(JsonValue::Null) => false,
            Val::Defined(JsonValue::Bool(b)) => *b,
            Val::Defined(JsonValue::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
            Val::Defined(JsonValue::String(s)) => !s.is_empty(),
            Val::Defined(_) => true,
        }
    }
}

impl From<JsonValue> for Val {
    fn from(v: JsonValue) -> Self {
        Val::Defined(v)
    }
}

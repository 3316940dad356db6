//! Symbol table and dynamic reference resolution
//!
//! The symbol table is a per-job, read-only JSON view: one entry per
//! completed activity (`{input, output: {data, metadata}}` addressable by
//! activity id), `$job` for the job's accumulated data, and `$self` bound to
//! the activity currently being mapped. Only the execution engine writes
//! entries; the interpreter never mutates it.

use serde_json::{json, Map, Value as JsonValue};

use super::Val;

/// What a cell of a pipe row is, decided purely by its surface syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Plain value, used as-is.
    Literal(JsonValue),
    /// `{some.dot.path}` - resolved against the symbol table.
    DynamicRef(String),
    /// `{@category.name}` - a catalog function reference.
    FunctionRef(String),
}

/// Classify a raw cell value. Strings of the form `{...}` are references;
/// everything else is a literal.
pub fn classify(value: &JsonValue) -> Cell {
    if let JsonValue::String(s) = value {
        if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
            let inner = &s[1..s.len() - 1];
            if let Some(name) = inner.strip_prefix('@') {
                return Cell::FunctionRef(name.to_string());
            }
            return Cell::DynamicRef(inner.to_string());
        }
    }
    Cell::Literal(value.clone())
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    root: Map<String, JsonValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed activity's input/output under its id.
    pub fn set_activity(
        &mut self,
        activity_id: &str,
        input: Option<&JsonValue>,
        output: Option<&JsonValue>,
        metadata: &JsonValue,
    ) {
        self.root.insert(
            activity_id.to_string(),
            json!({
                "input": input.cloned().unwrap_or(JsonValue::Null),
                "output": {
                    "data": output.cloned().unwrap_or(JsonValue::Null),
                    "metadata": metadata.clone(),
                },
            }),
        );
    }

    /// Expose the job's accumulated data and metadata as `$job`.
    pub fn set_job(&mut self, data: &JsonValue, metadata: &JsonValue) {
        self.root.insert(
            "$job".to_string(),
            json!({ "data": data.clone(), "metadata": metadata.clone() }),
        );
    }

    /// Bind `$self` to the activity currently being mapped. Overwrites any
    /// previous binding.
    pub fn bind_self(&mut self, entry: JsonValue) {
        self.root.insert("$self".to_string(), entry);
    }

    /// Resolve a dot path like `a1.output.data.full_name`. Missing segments
    /// yield `Val::Undefined`, never an error.
    pub fn resolve(&self, path: &str) -> Val {
        let mut segments = path.split('.');
        let first = match segments.next() {
            Some(s) if !s.is_empty() => s,
            _ => return Val::Undefined,
        };

        let mut current = match self.root.get(first) {
            Some(v) => v,
            None => return Val::Undefined,
        };

        for segment in segments {
            current = match current {
                JsonValue::Object(obj) => match obj.get(segment) {
                    Some(v) => v,
                    None => return Val::Undefined,
                },
                JsonValue::Array(arr) => match segment.parse::<usize>().ok().and_then(|i| arr.get(i)) {
                    Some(v) => v,
                    None => return Val::Undefined,
                },
                _ => return Val::Undefined,
            };
        }

        Val::Defined(current.clone())
    }
}

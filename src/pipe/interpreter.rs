//! Pipe evaluation
//!
//! A pipe is an ordered list of rows. Row 0 seeds the carry set: each of its
//! cells resolves independently (a function reference in row 0 is invoked
//! with no arguments). Every later plain-array row must start with a function
//! reference; it is invoked with the carry set followed by the row's resolved
//! trailing cells, and its return value becomes the new carry set. A row may
//! instead be a nested `{"@pipe": [...]}` object: a fan-out branch evaluated
//! against the carry set available before the block, whose result becomes one
//! element of the carry set consumed by the next plain-array row.

use serde_json::{Map, Value as JsonValue};

use crate::error::EngineError;
use crate::functions::FunctionRegistry;

use super::resolver::{classify, Cell, SymbolTable};
use super::Val;

pub struct Interpreter<'a> {
    symbols: &'a SymbolTable,
    functions: &'a FunctionRegistry,
}

impl<'a> Interpreter<'a> {
    pub fn new(symbols: &'a SymbolTable, functions: &'a FunctionRegistry) -> Self {
        Self { symbols, functions }
    }

    /// Evaluate one expression: a literal, a `{path}` reference, a bare
    /// `{@fn}` reference (invoked with no arguments), or a `{"@pipe": ...}`
    /// object. Containers are resolved recursively; object fields that
    /// resolve to undefined are dropped, array elements become null.
    pub fn eval(&self, expr: &JsonValue) -> Result<Val, EngineError> {
        match expr {
            JsonValue::String(_) => match classify(expr) {
                Cell::Literal(v) => Ok(Val::Defined(v)),
                Cell::DynamicRef(path) => Ok(self.symbols.resolve(&path)),
                Cell::FunctionRef(name) => self.functions.invoke(&name, &[]),
            },
            JsonValue::Object(obj) => {
                if let Some(rows) = pipe_rows(obj) {
                    return self.eval_pipe(rows);
                }
                let mut out = Map::new();
                for (key, value) in obj {
                    match self.eval(value)? {
                        Val::Undefined => {}
                        Val::Defined(v) => {
                            out.insert(key.clone(), v);
                        }
                    }
                }
                Ok(Val::Defined(JsonValue::Object(out)))
            }
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?.into_json());
                }
                Ok(Val::Defined(JsonValue::Array(out)))
            }
            other => Ok(Val::Defined(other.clone())),
        }
    }

    /// Evaluate a top-level pipe (no upstream carry).
    pub fn eval_pipe(&self, rows: &[JsonValue]) -> Result<Val, EngineError> {
        self.eval_pipe_with(rows, None)
    }

    fn eval_pipe_with(
        &self,
        rows: &[JsonValue],
        upstream: Option<&[Val]>,
    ) -> Result<Val, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::invalid_pipe("pipe has no rows"));
        }

        let mut carry: Option<Vec<Val>> = None;
        // Results of consecutive nested-pipe branches, waiting for the next
        // plain-array row to consume them in declaration order.
        let mut fanout: Vec<Val> = Vec::new();

        for row in rows {
            match row {
                JsonValue::Object(obj) => {
                    let branch_rows = pipe_rows(obj).ok_or_else(|| {
                        EngineError::invalid_pipe("object row must be {\"@pipe\": [...]}")
                    })?;
                    let base = carry.as_deref().or(upstream);
                    fanout.push(self.eval_pipe_with(branch_rows, base)?);
                }
                JsonValue::Array(cells) => {
                    if !fanout.is_empty() {
                        carry = Some(std::mem::take(&mut fanout));
                    }
                    // A branch's first row consumes the parent carry set when
                    // it starts with a function reference; otherwise it seeds
                    // its own carry independently.
                    if carry.is_none() {
                        if let (Some(up), Some(first)) = (upstream, cells.first()) {
                            if matches!(classify(first), Cell::FunctionRef(_)) {
                                carry = Some(up.to_vec());
                            }
                        }
                    }
                    carry = Some(self.eval_row(cells, carry)?);
                }
                other => {
                    return Err(EngineError::invalid_pipe(format!(
                        "pipe row must be an array or a nested pipe, got {}",
                        type_name(other)
                    )));
                }
            }
        }

        if !fanout.is_empty() {
            carry = Some(std::mem::take(&mut fanout));
        }

        let mut result = carry.unwrap_or_default();
        if result.len() == 1 {
            return Ok(result.remove(0));
        }
        Ok(Val::Defined(JsonValue::Array(
            result.into_iter().map(Val::into_json).collect(),
        )))
    }

    /// Resolve one plain-array row against the carry set so far. With no
    /// carry this is a seed row; with a carry, cell 0 must be a function.
    fn eval_row(
        &self,
        cells: &[JsonValue],
        carry: Option<Vec<Val>>,
    ) -> Result<Vec<Val>, EngineError> {
        if cells.is_empty() {
            return Err(EngineError::invalid_pipe("pipe row has no cells"));
        }

        match carry {
            None => {
                let mut seed = Vec::with_capacity(cells.len());
                for cell in cells {
                    seed.push(match classify(cell) {
                        Cell::Literal(v) => Val::Defined(v),
                        Cell::DynamicRef(path) => self.symbols.resolve(&path),
                        // Nullary seed, e.g. a current-time function
                        Cell::FunctionRef(name) => self.functions.invoke(&name, &[])?,
                    });
                }
                Ok(seed)
            }
            Some(carry) => {
                let name = match classify(&cells[0]) {
                    Cell::FunctionRef(name) => name,
                    _ => {
                        return Err(EngineError::invalid_pipe(format!(
                            "cell 0 of a non-first row must be a function reference, got {}",
                            cells[0]
                        )));
                    }
                };

                let mut args = carry;
                for cell in &cells[1..] {
                    args.push(match classify(cell) {
                        Cell::Literal(v) => Val::Defined(v),
                        Cell::DynamicRef(path) => self.symbols.resolve(&path),
                        Cell::FunctionRef(_) => {
                            return Err(EngineError::invalid_pipe(
                                "function references are only valid in cell 0 of a row",
                            ));
                        }
                    });
                }

                Ok(vec![self.functions.invoke(&name, &args)?])
            }
        }
    }
}

/// Rows of a `{"@pipe": [...]}` object, if that is what `obj` is.
fn pipe_rows(obj: &Map<String, JsonValue>) -> Option<&Vec<JsonValue>> {
    if obj.len() == 1 {
        if let Some(JsonValue::Array(rows)) = obj.get("@pipe") {
            return Some(rows);
        }
    }
    None
}

fn type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

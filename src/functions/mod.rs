//! Function catalog
//!
//! A named registry of pure functions invoked from pipe expressions as
//! `{@category.name}`. The registry is pluggable: callers may register
//! additional functions without touching the interpreter. Every built-in is
//! pure (identical inputs, identical outputs) so conditions and mappings can
//! be safely re-evaluated on redelivery; `date.now` is the one sanctioned
//! nullary exception, valid only where a pipe's row 0 allows it.

pub mod array;
pub mod bitwise;
pub mod conditional;
pub mod date;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod string;
pub mod symbol;
pub mod unary;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::EngineError;
use crate::pipe::Val;

pub type FnResult = Result<Val, EngineError>;
pub type CatalogFn = dyn Fn(&[Val]) -> FnResult + Send + Sync;

pub struct FunctionSpec {
    pub name: String,
    pub min_args: usize,
    pub max_args: Option<usize>,
    f: Box<CatalogFn>,
}

impl FunctionSpec {
    fn check_arity(&self, actual: usize) -> Result<(), EngineError> {
        let ok = actual >= self.min_args && self.max_args.map_or(true, |max| actual <= max);
        if ok {
            return Ok(());
        }
        let expected = match self.max_args {
            Some(max) if max == self.min_args => format!("{}", self.min_args),
            Some(max) => format!("{}..{}", self.min_args, max),
            None => format!("{}..", self.min_args),
        };
        Err(EngineError::ArityMismatch {
            function: self.name.clone(),
            expected,
            actual,
        })
    }
}

/// Catalog of named functions, keyed `category.name`.
pub struct FunctionRegistry {
    entries: HashMap<String, Arc<FunctionSpec>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry pre-loaded with every built-in category.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        array::register(&mut registry);
        bitwise::register(&mut registry);
        conditional::register(&mut registry);
        date::register(&mut registry);
        json::register(&mut registry);
        math::register(&mut registry);
        number::register(&mut registry);
        object::register(&mut registry);
        string::register(&mut registry);
        symbol::register(&mut registry);
        unary::register(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, f: F)
    where
        F: Fn(&[Val]) -> FnResult + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Arc::new(FunctionSpec {
                name: name.to_string(),
                min_args,
                max_args,
                f: Box::new(f),
            }),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up and invoke, enforcing declared arity.
    pub fn invoke(&self, name: &str, args: &[Val]) -> FnResult {
        let spec = self.entries.get(name).ok_or_else(|| {
            EngineError::invalid_pipe(format!("unknown function '{{@{}}}'", name))
        })?;
        spec.check_arity(args.len())?;
        (spec.f)(args)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// Argument extraction helpers shared by the category modules

fn arg_err(function: &str, detail: &str) -> EngineError {
    EngineError::invalid_pipe(format!("{}: {}", function, detail))
}

fn as_str<'a>(function: &str, args: &'a [Val], i: usize) -> Result<&'a str, EngineError> {
    args.get(i)
        .and_then(|v| v.as_json())
        .and_then(|v| v.as_str())
        .ok_or_else(|| arg_err(function, &format!("argument {} must be a string", i)))
}

fn as_f64(function: &str, args: &[Val], i: usize) -> Result<f64, EngineError> {
    args.get(i)
        .and_then(|v| v.as_json())
        .and_then(|v| v.as_f64())
        .ok_or_else(|| arg_err(function, &format!("argument {} must be a number", i)))
}

fn as_i64(function: &str, args: &[Val], i: usize) -> Result<i64, EngineError> {
    args.get(i)
        .and_then(|v| v.as_json())
        .and_then(|v| v.as_i64())
        .ok_or_else(|| arg_err(function, &format!("argument {} must be an integer", i)))
}

fn as_array<'a>(
    function: &str,
    args: &'a [Val],
    i: usize,
) -> Result<&'a Vec<JsonValue>, EngineError> {
    args.get(i)
        .and_then(|v| v.as_json())
        .and_then(|v| v.as_array())
        .ok_or_else(|| arg_err(function, &format!("argument {} must be an array", i)))
}

fn as_object<'a>(
    function: &str,
    args: &'a [Val],
    i: usize,
) -> Result<&'a serde_json::Map<String, JsonValue>, EngineError> {
    args.get(i)
        .and_then(|v| v.as_json())
        .and_then(|v| v.as_object())
        .ok_or_else(|| arg_err(function, &format!("argument {} must be an object", i)))
}

fn number(f: f64) -> Val {
    match serde_json::Number::from_f64(f) {
        Some(n) => Val::Defined(JsonValue::Number(n)),
        None => Val::Defined(JsonValue::Null),
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

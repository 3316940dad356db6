//! `symbol.*` catalog functions
//!
//! Nullary producers for values the expression syntax cannot spell directly.

use serde_json::Value as JsonValue;

use super::FunctionRegistry;
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("symbol.null", 0, Some(0), |_args| {
        Ok(Val::Defined(JsonValue::Null))
    });

    registry.register("symbol.undefined", 0, Some(0), |_args| Ok(Val::Undefined));
}

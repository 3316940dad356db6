//! `json.*` catalog functions

use serde_json::{json, Value as JsonValue};

use super::{as_str, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("json.stringify", 1, Some(1), |args| {
        let value = args
            .first()
            .and_then(|v| v.as_json())
            .cloned()
            .unwrap_or(JsonValue::Null);
        let s = serde_json::to_string(&value)
            .map_err(|e| super::arg_err("json.stringify", &e.to_string()))?;
        Ok(Val::Defined(json!(s)))
    });

    registry.register("json.parse", 1, Some(1), |args| {
        let s = as_str("json.parse", args, 0)?;
        let value: JsonValue = serde_json::from_str(s)
            .map_err(|e| super::arg_err("json.parse", &format!("invalid JSON: {}", e)))?;
        Ok(Val::Defined(value))
    });
}

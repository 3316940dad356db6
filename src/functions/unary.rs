//! `unary.*` catalog functions

use serde_json::json;

use super::{as_f64, number, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("unary.not", 1, Some(1), |args| {
        Ok(Val::Defined(json!(!args[0].is_truthy())))
    });

    registry.register("unary.negative", 1, Some(1), |args| {
        Ok(number(-as_f64("unary.negative", args, 0)?))
    });

    registry.register("unary.boolean", 1, Some(1), |args| {
        Ok(Val::Defined(json!(args[0].is_truthy())))
    });
}

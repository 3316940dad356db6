//! `bitwise.*` catalog functions
//!
//! Operands are treated as 64-bit signed integers; non-integer inputs are an
//! expression error.

use serde_json::json;

use super::{as_i64, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("bitwise.and", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_i64("bitwise.and", args, 0)? & as_i64("bitwise.and", args, 1)?
        )))
    });

    registry.register("bitwise.or", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_i64("bitwise.or", args, 0)? | as_i64("bitwise.or", args, 1)?
        )))
    });

    registry.register("bitwise.xor", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_i64("bitwise.xor", args, 0)? ^ as_i64("bitwise.xor", args, 1)?
        )))
    });

    registry.register("bitwise.not", 1, Some(1), |args| {
        Ok(Val::Defined(json!(!as_i64("bitwise.not", args, 0)?)))
    });

    registry.register("bitwise.lshift", 2, Some(2), |args| {
        let n = as_i64("bitwise.lshift", args, 0)?;
        let by = as_i64("bitwise.lshift", args, 1)?.clamp(0, 63) as u32;
        Ok(Val::Defined(json!(n.wrapping_shl(by))))
    });

    registry.register("bitwise.rshift", 2, Some(2), |args| {
        let n = as_i64("bitwise.rshift", args, 0)?;
        let by = as_i64("bitwise.rshift", args, 1)?.clamp(0, 63) as u32;
        Ok(Val::Defined(json!(n.wrapping_shr(by))))
    });
}

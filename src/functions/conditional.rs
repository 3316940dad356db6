//! `conditional.*` catalog functions

use serde_json::json;

use super::FunctionRegistry;
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    // Loose equality: numbers compare numerically, otherwise JSON equality.
    // Undefined equals only undefined and null.
    registry.register("conditional.equality", 2, Some(2), |args| {
        Ok(Val::Defined(json!(loose_eq(&args[0], &args[1]))))
    });

    registry.register("conditional.inequality", 2, Some(2), |args| {
        Ok(Val::Defined(json!(!loose_eq(&args[0], &args[1]))))
    });

    // Strict equality: undefined never equals null, numbers still compare
    // numerically (JSON does not distinguish 1 from 1.0 meaningfully).
    registry.register("conditional.strict_equality", 2, Some(2), |args| {
        let eq = match (&args[0], &args[1]) {
            (Val::Undefined, Val::Undefined) => true,
            (Val::Undefined, _) | (_, Val::Undefined) => false,
            (Val::Defined(a), Val::Defined(b)) => json_eq(a, b),
        };
        Ok(Val::Defined(json!(eq)))
    });

    // ternary(condition, when_true, when_false)
    registry.register("conditional.ternary", 3, Some(3), |args| {
        if args[0].is_truthy() {
            Ok(args[1].clone())
        } else {
            Ok(args[2].clone())
        }
    });

    // First defined, non-null argument
    registry.register("conditional.nullish", 1, None, |args| {
        for arg in args {
            match arg {
                Val::Undefined => continue,
                Val::Defined(serde_json::Value::Null) => continue,
                defined => return Ok(defined.clone()),
            }
        }
        Ok(Val::Defined(serde_json::Value::Null))
    });
}

fn loose_eq(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Undefined, Val::Undefined) => true,
        (Val::Undefined, Val::Defined(v)) | (Val::Defined(v), Val::Undefined) => v.is_null(),
        (Val::Defined(a), Val::Defined(b)) => json_eq(a, b),
    }
}

fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

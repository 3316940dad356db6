//! `array.*` catalog functions

use serde_json::{json, Value as JsonValue};

use super::{as_array, as_i64, as_str, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("array.get", 2, Some(2), |args| {
        let arr = as_array("array.get", args, 0)?;
        let i = as_i64("array.get", args, 1)?;
        let idx = if i < 0 { arr.len() as i64 + i } else { i };
        if idx < 0 {
            return Ok(Val::Undefined);
        }
        Ok(match arr.get(idx as usize) {
            Some(v) => Val::Defined(v.clone()),
            None => Val::Undefined,
        })
    });

    registry.register("array.length", 1, Some(1), |args| {
        let arr = as_array("array.length", args, 0)?;
        Ok(Val::Defined(json!(arr.len())))
    });

    registry.register("array.slice", 2, Some(3), |args| {
        let arr = as_array("array.slice", args, 0)?;
        let len = arr.len() as i64;
        let start = clamp(as_i64("array.slice", args, 1)?, len);
        let end = if args.len() > 2 {
            clamp(as_i64("array.slice", args, 2)?, len)
        } else {
            len
        };
        let out = if start < end {
            arr[start as usize..end as usize].to_vec()
        } else {
            Vec::new()
        };
        Ok(Val::Defined(JsonValue::Array(out)))
    });

    registry.register("array.reverse", 1, Some(1), |args| {
        let mut arr = as_array("array.reverse", args, 0)?.clone();
        arr.reverse();
        Ok(Val::Defined(JsonValue::Array(arr)))
    });

    registry.register("array.join", 2, Some(2), |args| {
        let arr = as_array("array.join", args, 0)?;
        let sep = as_str("array.join", args, 1)?;
        let parts: Vec<String> = arr
            .iter()
            .map(|v| match v {
                JsonValue::String(s) => s.clone(),
                JsonValue::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        Ok(Val::Defined(json!(parts.join(sep))))
    });

    registry.register("array.concat", 1, None, |args| {
        let mut out: Vec<JsonValue> = Vec::new();
        for (i, _) in args.iter().enumerate() {
            out.extend(as_array("array.concat", args, i)?.iter().cloned());
        }
        Ok(Val::Defined(JsonValue::Array(out)))
    });

    registry.register("array.index_of", 2, Some(2), |args| {
        let arr = as_array("array.index_of", args, 0)?;
        let needle = args
            .get(1)
            .and_then(|v| v.as_json())
            .cloned()
            .unwrap_or(JsonValue::Null);
        let idx = arr
            .iter()
            .position(|v| *v == needle)
            .map(|i| i as i64)
            .unwrap_or(-1);
        Ok(Val::Defined(json!(idx)))
    });
}

fn clamp(i: i64, len: i64) -> i64 {
    if i < 0 {
        (len + i).max(0)
    } else {
        i.min(len)
    }
}

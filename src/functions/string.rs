//! `string.*` catalog functions

use serde_json::{json, Value as JsonValue};

use super::{as_i64, as_str, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("string.concat", 1, None, |args| {
        let mut out = String::new();
        for (i, arg) in args.iter().enumerate() {
            match arg.as_json() {
                Some(JsonValue::String(s)) => out.push_str(s),
                Some(JsonValue::Number(n)) => out.push_str(&n.to_string()),
                Some(JsonValue::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
                Some(JsonValue::Null) | None => {}
                Some(_) => {
                    return Err(super::arg_err(
                        "string.concat",
                        &format!("argument {} is not concatenable", i),
                    ))
                }
            }
        }
        Ok(Val::Defined(json!(out)))
    });

    registry.register("string.split", 2, Some(2), |args| {
        let s = as_str("string.split", args, 0)?;
        let sep = as_str("string.split", args, 1)?;
        let parts: Vec<JsonValue> = if sep.is_empty() {
            s.chars().map(|c| json!(c.to_string())).collect()
        } else {
            s.split(sep).map(|p| json!(p)).collect()
        };
        Ok(Val::Defined(JsonValue::Array(parts)))
    });

    registry.register("string.char_at", 2, Some(2), |args| {
        let s = as_str("string.char_at", args, 0)?;
        let i = as_i64("string.char_at", args, 1)?;
        if i < 0 {
            return Ok(Val::Defined(json!("")));
        }
        let out = s
            .chars()
            .nth(i as usize)
            .map(|c| c.to_string())
            .unwrap_or_default();
        Ok(Val::Defined(json!(out)))
    });

    registry.register("string.slice", 2, Some(3), |args| {
        let s = as_str("string.slice", args, 0)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len() as i64;
        let start = clamp_index(as_i64("string.slice", args, 1)?, len);
        let end = if args.len() > 2 {
            clamp_index(as_i64("string.slice", args, 2)?, len)
        } else {
            len
        };
        let out: String = if start < end {
            chars[start as usize..end as usize].iter().collect()
        } else {
            String::new()
        };
        Ok(Val::Defined(json!(out)))
    });

    registry.register("string.to_upper_case", 1, Some(1), |args| {
        let s = as_str("string.to_upper_case", args, 0)?;
        Ok(Val::Defined(json!(s.to_uppercase())))
    });

    registry.register("string.to_lower_case", 1, Some(1), |args| {
        let s = as_str("string.to_lower_case", args, 0)?;
        Ok(Val::Defined(json!(s.to_lowercase())))
    });

    registry.register("string.trim", 1, Some(1), |args| {
        let s = as_str("string.trim", args, 0)?;
        Ok(Val::Defined(json!(s.trim())))
    });

    registry.register("string.length", 1, Some(1), |args| {
        let s = as_str("string.length", args, 0)?;
        Ok(Val::Defined(json!(s.chars().count())))
    });

    registry.register("string.includes", 2, Some(2), |args| {
        let s = as_str("string.includes", args, 0)?;
        let needle = as_str("string.includes", args, 1)?;
        Ok(Val::Defined(json!(s.contains(needle))))
    });

    registry.register("string.starts_with", 2, Some(2), |args| {
        let s = as_str("string.starts_with", args, 0)?;
        let prefix = as_str("string.starts_with", args, 1)?;
        Ok(Val::Defined(json!(s.starts_with(prefix))))
    });

    registry.register("string.pad_start", 2, Some(3), |args| {
        let s = as_str("string.pad_start", args, 0)?;
        let target = as_i64("string.pad_start", args, 1)?.max(0) as usize;
        let pad = if args.len() > 2 {
            as_str("string.pad_start", args, 2)?.to_string()
        } else {
            " ".to_string()
        };
        let mut out = String::new();
        let current = s.chars().count();
        if current < target && !pad.is_empty() {
            let mut fill: Vec<char> = Vec::new();
            let pad_chars: Vec<char> = pad.chars().collect();
            while fill.len() < target - current {
                fill.push(pad_chars[fill.len() % pad_chars.len()]);
            }
            out.extend(fill);
        }
        out.push_str(s);
        Ok(Val::Defined(json!(out)))
    });
}

/// Negative indices count from the end, out-of-range clamps to bounds.
fn clamp_index(i: i64, len: i64) -> i64 {
    if i < 0 {
        (len + i).max(0)
    } else {
        i.min(len)
    }
}

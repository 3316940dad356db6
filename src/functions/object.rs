//! `object.*` catalog functions

use serde_json::{json, Map, Value as JsonValue};

use super::{as_object, as_str, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("object.get", 2, Some(2), |args| {
        let obj = as_object("object.get", args, 0)?;
        let key = as_str("object.get", args, 1)?;
        Ok(match obj.get(key) {
            Some(v) => Val::Defined(v.clone()),
            None => Val::Undefined,
        })
    });

    registry.register("object.keys", 1, Some(1), |args| {
        let obj = as_object("object.keys", args, 0)?;
        let keys: Vec<JsonValue> = obj.keys().map(|k| json!(k)).collect();
        Ok(Val::Defined(JsonValue::Array(keys)))
    });

    registry.register("object.values", 1, Some(1), |args| {
        let obj = as_object("object.values", args, 0)?;
        let values: Vec<JsonValue> = obj.values().cloned().collect();
        Ok(Val::Defined(JsonValue::Array(values)))
    });

    // Later arguments win on key collision
    registry.register("object.merge", 1, None, |args| {
        let mut out = Map::new();
        for (i, _) in args.iter().enumerate() {
            let obj = as_object("object.merge", args, i)?;
            for (k, v) in obj {
                out.insert(k.clone(), v.clone());
            }
        }
        Ok(Val::Defined(JsonValue::Object(out)))
    });

    // Alternating key/value arguments: create("a", 1, "b", 2)
    registry.register("object.create", 0, None, |args| {
        if args.len() % 2 != 0 {
            return Err(super::arg_err(
                "object.create",
                "requires an even number of arguments (key/value pairs)",
            ));
        }
        let mut out = Map::new();
        for pair in args.chunks(2) {
            let key = pair[0]
                .as_json()
                .and_then(|v| v.as_str())
                .ok_or_else(|| super::arg_err("object.create", "keys must be strings"))?;
            out.insert(key.to_string(), pair[1].clone().into_json());
        }
        Ok(Val::Defined(JsonValue::Object(out)))
    });

    registry.register("object.has", 2, Some(2), |args| {
        let obj = as_object("object.has", args, 0)?;
        let key = as_str("object.has", args, 1)?;
        Ok(Val::Defined(json!(obj.contains_key(key))))
    });
}

//! Minimal structural schema validation
//!
//! A deliberately small subset: `type`, `properties`, `required`, `items`.
//! Enough to gate activity inputs/outputs; anything richer belongs to
//! external descriptor tooling.

use serde_json::Value as JsonValue;

const TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Check that a schema document itself is well-formed.
pub fn check_schema(schema: &JsonValue) -> Result<(), String> {
    let obj = match schema {
        JsonValue::Object(obj) => obj,
        _ => return Err("schema must be an object".to_string()),
    };

    if let Some(t) = obj.get("type") {
        let name = t.as_str().ok_or("'type' must be a string")?;
        if !TYPES.contains(&name) {
            return Err(format!("unknown type '{}'", name));
        }
    }

    if let Some(props) = obj.get("properties") {
        let props = props.as_object().ok_or("'properties' must be an object")?;
        for (key, sub) in props {
            check_schema(sub).map_err(|e| format!("properties.{}: {}", key, e))?;
        }
    }

    if let Some(required) = obj.get("required") {
        let list = required.as_array().ok_or("'required' must be an array")?;
        if !list.iter().all(|v| v.is_string()) {
            return Err("'required' entries must be strings".to_string());
        }
    }

    if let Some(items) = obj.get("items") {
        check_schema(items).map_err(|e| format!("items: {}", e))?;
    }

    Ok(())
}

/// Validate a value against a schema. Unknown object keys are permitted.
pub fn validate(schema: &JsonValue, value: &JsonValue) -> Result<(), String> {
    let obj = match schema {
        JsonValue::Object(obj) => obj,
        _ => return Ok(()),
    };

    if let Some(expected) = obj.get("type").and_then(|t| t.as_str()) {
        if !type_matches(expected, value) {
            return Err(format!(
                "expected {}, got {}",
                expected,
                json_type(value)
            ));
        }
    }

    if let (Some(required), JsonValue::Object(map)) = (obj.get("required"), value) {
        for key in required.as_array().into_iter().flatten() {
            if let Some(key) = key.as_str() {
                if !map.contains_key(key) {
                    return Err(format!("missing required field '{}'", key));
                }
            }
        }
    }

    if let (Some(props), JsonValue::Object(map)) = (obj.get("properties"), value) {
        for (key, sub) in props.as_object().into_iter().flatten() {
            if let Some(v) = map.get(key) {
                validate(sub, v).map_err(|e| format!("{}: {}", key, e))?;
            }
        }
    }

    if let (Some(items), JsonValue::Array(arr)) = (obj.get("items"), value) {
        for (i, v) in arr.iter().enumerate() {
            validate(items, v).map_err(|e| format!("[{}]: {}", i, e))?;
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &JsonValue) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_value() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a"]
        });
        assert!(validate(&schema, &json!({"a": "hello"})).is_ok());
    }

    #[test]
    fn rejects_wrong_type_and_missing_required() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a"]
        });
        assert!(validate(&schema, &json!({"a": 1})).is_err());
        assert!(validate(&schema, &json!({})).is_err());
    }

    #[test]
    fn rejects_malformed_schema() {
        assert!(check_schema(&json!({"type": "banana"})).is_err());
        assert!(check_schema(&json!({"properties": []})).is_err());
        assert!(check_schema(&json!({"type": "object"})).is_ok());
    }
}

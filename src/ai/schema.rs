//! Validation of structured model output against JSON schemas.
//!
//! Only the subset of JSON Schema that this crate emits is understood:
//! `type` (single or list), `enum`, `properties`, `required`,
//! `additionalProperties: false`, `items`, `minItems` and `maxItems`.
//! Unknown keywords are ignored.

use serde_json::{Map, Value};

/// Validate `instance` against `schema`.
///
/// # Errors
///
/// Returns a description of the first violation found, prefixed with the
/// JSON pointer of the offending value.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    validate_at(schema, instance, "")
}

fn validate_at(schema: &Value, instance: &Value, path: &str) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = schema.get("type") {
        check_type(expected, instance, path)?;
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(instance) {
            return Err(format!(
                "{}: {instance} is not one of {}",
                at(path),
                Value::Array(allowed.clone())
            ));
        }
    }

    match instance {
        Value::Object(map) => check_object(schema, map, path),
        Value::Array(items) => check_array(schema, items, path),
        _ => Ok(()),
    }
}

fn check_type(expected: &Value, instance: &Value, path: &str) -> Result<(), String> {
    let matches = match expected {
        Value::String(name) => type_matches(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| type_matches(name, instance)),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(format!("{}: expected type {expected}, found {}", at(path), type_name(instance)))
    }
}

fn check_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
) -> Result<(), String> {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                return Err(format!("{}: missing required property `{key}`", at(path)));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in map {
        match properties.and_then(|props| props.get(key)) {
            Some(sub_schema) => validate_at(sub_schema, value, &format!("{path}/{key}"))?,
            None if closed => {
                return Err(format!("{}: unexpected property `{key}`", at(path)));
            }
            None => {}
        }
    }
    Ok(())
}

fn check_array(schema: &Map<String, Value>, items: &[Value], path: &str) -> Result<(), String> {
    let len = items.len() as u64;
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if len < min {
            return Err(format!("{}: expected at least {min} items, found {len}", at(path)));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if len > max {
            return Err(format!("{}: expected at most {max} items, found {len}", at(path)));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter().enumerate() {
            validate_at(item_schema, item, &format!("{path}/{i}"))?;
        }
    }
    Ok(())
}

fn type_matches(name: &str, instance: &Value) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => instance.is_i64() || instance.is_u64(),
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn at(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

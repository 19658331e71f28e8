//! Output schema - the standard JSON Schema of projected documents.
//!
//! Rewrites a form schema so it describes what the serializer emits:
//! properties renamed to their output keys, unprojected properties removed
//! (from `required` too), `nullable` folded into `type`, and form
//! annotations stripped.

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::registry::FieldTypeRegistry;
use crate::schema::{compile_projection, SchemaSet};
use crate::types::{CompileOptions, FORM_ANNOTATIONS};

/// Project a form schema with default options.
///
/// # Errors
///
/// Returns `CompileError` if the form schema does not compile.
pub fn output_schema(schema: &Value) -> Result<Value, CompileError> {
    output_schema_with(schema, &CompileOptions::new())
}

/// Project a form schema.
///
/// When `options.strict` is true, sets `additionalProperties: false` on
/// every object schema that does not declare it, matching the closed
/// objects the compiler builds in strict mode.
pub fn output_schema_with(schema: &Value, options: &CompileOptions) -> Result<Value, CompileError> {
    SchemaSet::compile(schema, &FieldTypeRegistry::standard(), options)?;

    let mut projected = project_value(schema, "")?;
    if options.strict {
        close_additional_properties(&mut projected);
    }
    Ok(projected)
}

/// Strip all form annotations from a schema.
pub fn strip_annotations(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !FORM_ANNOTATIONS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), strip_annotations(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(strip_annotations).collect()),
        other => other.clone(),
    }
}

fn project_value(value: &Value, path: &str) -> Result<Value, CompileError> {
    match value {
        Value::Object(map) => project_object(map, path),
        Value::Array(arr) => {
            let mut result = Vec::with_capacity(arr.len());
            for (i, item) in arr.iter().enumerate() {
                result.push(project_value(item, &format!("{}/{}", path, i))?);
            }
            Ok(Value::Array(result))
        }
        other => Ok(other.clone()),
    }
}

fn project_object(map: &Map<String, Value>, path: &str) -> Result<Value, CompileError> {
    let mut result = Map::new();
    let mut renamed: Option<(Map<String, Value>, Vec<(String, String)>)> = None;

    for (key, value) in map {
        if FORM_ANNOTATIONS.contains(&key.as_str()) {
            continue;
        }

        let child_path = format!("{}/{}", path, key);

        match key.as_str() {
            "properties" => {
                let props = value.as_object();
                let projection = compile_projection(map, props, path)?;
                let mut projected = Map::new();
                let mut names = Vec::new();
                for entry in projection.entries() {
                    let Some(prop) = props.and_then(|p| p.get(entry.name())) else {
                        // Projected without a declared property: any value.
                        projected.insert(entry.output().to_string(), Value::Bool(true));
                        continue;
                    };
                    let prop_path = format!("{}/{}", child_path, entry.name());
                    projected.insert(entry.output().to_string(), project_value(prop, &prop_path)?);
                    names.push((entry.name().to_string(), entry.output().to_string()));
                }
                renamed = Some((projected, names));
            }
            "required" | "nullable" => continue,
            // Literal data, not subschemas.
            "default" | "const" | "enum" | "examples" => {
                result.insert(key.clone(), value.clone());
            }
            _ => {
                result.insert(key.clone(), project_value(value, &child_path)?);
            }
        }
    }

    if map.get("nullable") == Some(&Value::Bool(true)) {
        if let Some(Value::String(tag)) = result.get("type") {
            let types = vec![Value::String(tag.clone()), Value::String("null".to_string())];
            result.insert("type".to_string(), Value::Array(types));
        }
    }

    let required: Vec<&str> = map
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    match renamed {
        Some((projected, names)) => {
            let required: Vec<Value> = required
                .iter()
                .filter_map(|name| {
                    names
                        .iter()
                        .find(|(internal, _)| internal == name)
                        .map(|(_, output)| Value::String(output.clone()))
                })
                .collect();
            result.insert("properties".to_string(), Value::Object(projected));
            if !required.is_empty() || map.contains_key("required") {
                result.insert("required".to_string(), Value::Array(required));
            }
        }
        None => {
            if map.contains_key("required") {
                let required = required.into_iter().map(|s| Value::String(s.to_string()));
                result.insert("required".to_string(), Value::Array(required.collect()));
            }
        }
    }

    Ok(Value::Object(result))
}

/// Recursively set `additionalProperties: false` on object schemas that
/// leave it unset.
fn close_additional_properties(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };

    let is_object_schema = map.get("type").and_then(Value::as_str) == Some("object")
        || map.contains_key("properties");
    if is_object_schema && !map.contains_key("additionalProperties") {
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    for (key, child) in map.iter_mut() {
        match key.as_str() {
            "properties" | "$defs" | "definitions" => {
                if let Value::Object(entries) = child {
                    entries.values_mut().for_each(close_additional_properties);
                }
            }
            "items" | "additionalProperties" => close_additional_properties(child),
            "allOf" | "anyOf" | "oneOf" => {
                if let Value::Array(branches) = child {
                    branches.iter_mut().for_each(close_additional_properties);
                }
            }
            _ => {}
        }
    }
}

//! # Unstructured Access
//!
//! Field helpers for [`DynamicObject`]s whose schema is only known at runtime.
//! Paths address the object body (everything but `apiVersion`, `kind` and
//! `metadata`), e.g. `["spec", "replicas"]`.

use kube::core::DynamicObject;
use serde_json::{Map, Value};

/// Integer at a nested path, `None` when absent or not an integer
pub fn nested_i64(object: &DynamicObject, path: &[String]) -> Option<i64> {
    path.iter()
        .try_fold(&object.data, |value, segment| value.get(segment))
        .and_then(Value::as_i64)
}

/// Set a nested field, creating intermediate objects
///
/// Fails when an intermediate segment exists but is not an object.
pub fn set_nested(object: &mut DynamicObject, path: &[String], value: Value) -> Result<(), String> {
    let Some((leaf, parents)) = path.split_last() else {
        return Err("empty field path".to_string());
    };
    let mut current = &mut object.data;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(fields) => fields.entry(segment.clone()).or_insert(Value::Null),
            _ => return Err(format!("{segment} is not nested inside an object")),
        };
    }
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(fields) => {
            fields.insert(leaf.clone(), value);
            Ok(())
        }
        _ => Err(format!("{leaf} is not nested inside an object")),
    }
}

pub fn label<'a>(object: &'a DynamicObject, key: &str) -> Option<&'a str> {
    object
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}

pub fn set_label(object: &mut DynamicObject, key: &str, value: &str) {
    object
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
}

/// Remove a label
///
/// An emptied label map is kept, so a merge-patch diff removes only `key`
/// and leaves labels added by other writers in place.
pub fn remove_label(object: &mut DynamicObject, key: &str) {
    if let Some(labels) = object.metadata.labels.as_mut() {
        labels.remove(key);
    }
}

pub fn set_annotation(object: &mut DynamicObject, key: &str, value: &str) {
    object
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
}

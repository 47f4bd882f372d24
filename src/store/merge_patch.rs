//! # JSON Merge Patch
//!
//! Minimal RFC 7386 merge patch between two documents. Objects merge key by
//! key, `null` removes a key, every other value replaces wholesale. Patches
//! are applied with `json_patch::merge`.

use serde_json::{Map, Value};

/// Minimal merge patch turning `original` into `modified`, `None` when equal
pub fn diff(original: &Value, modified: &Value) -> Option<Value> {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            let mut patch = Map::new();
            for (key, old) in original {
                match modified.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(new) => {
                        if let Some(nested) = diff(old, new) {
                            patch.insert(key.clone(), nested);
                        }
                    }
                }
            }
            for (key, new) in modified {
                if !original.contains_key(key) {
                    patch.insert(key.clone(), new.clone());
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (old, new) if old == new => None,
        (_, new) => Some(new.clone()),
    }
}

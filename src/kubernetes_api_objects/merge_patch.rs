// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use serde::Serialize;
use serde_json::{Map, Value};

/// Computes the JSON merge patch (RFC 7386) that turns `original` into `modified`.
///
/// Objects are diffed key by key, removed keys become `null`, and any other
/// value (arrays included) is replaced wholesale. Equal documents yield an
/// empty object.
pub fn create_merge_patch(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            let mut patch = Map::new();
            for (key, original_value) in original {
                match modified.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(modified_value) if modified_value != original_value => {
                        let value = if original_value.is_object() && modified_value.is_object() {
                            create_merge_patch(original_value, modified_value)
                        } else {
                            modified_value.clone()
                        };
                        patch.insert(key.clone(), value);
                    }
                    Some(_) => {}
                }
            }
            for (key, modified_value) in modified {
                if !original.contains_key(key) {
                    patch.insert(key.clone(), modified_value.clone());
                }
            }
            Value::Object(patch)
        }
        _ => modified.clone(),
    }
}

/// Applies a JSON merge patch to `target` in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Builds a merge patch from two versions of the same object and pins it to
/// `resource_version`, so the API server rejects it with a conflict if the
/// object changed since it was read.
pub fn merge_from<K: Serialize>(
    original: &K,
    modified: &K,
    resource_version: Option<&str>,
) -> Result<Value, serde_json::Error> {
    let mut patch = create_merge_patch(&serde_json::to_value(original)?, &serde_json::to_value(modified)?);
    if let (Some(rv), Value::Object(fields)) = (resource_version, &mut patch) {
        let metadata = fields
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(metadata) = metadata {
            metadata.insert("resourceVersion".to_string(), Value::String(rv.to_string()));
        }
    }
    Ok(patch)
}

use serde_json::{Map, Value};

/// Merges `source` into `target` key by key.
///
/// Nested mappings present on both sides are merged recursively. Any other
/// value in `source` replaces the value in `target` at that key.
pub fn recursive_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, incoming) in source {
        match (target.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                recursive_merge(existing, incoming);
            }
            (_, incoming) => {
                target.insert(key, incoming);
            }
        }
    }
}

/// Merges a single value into `target`, see [recursive_merge]
pub fn merge_value(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(existing), Value::Object(incoming)) => recursive_merge(existing, incoming),
        (target, source) => *target = source,
    }
}

use serde_json::Value;

/// Recursively merge `source` into `target`.
///
/// - Values of different kinds: `source` overwrites.
/// - Two arrays: `source` items are appended, existing order kept.
/// - Two objects: merged key by key with the same rules.
/// - Two scalars: `source` overwrites.
pub fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Array(existing), Value::Array(incoming)) => existing.extend(incoming),
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

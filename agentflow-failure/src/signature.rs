//! Canonical signatures over tool inputs.
//!
//! Two independent concerts live here: hashing an input to a stable
//! per-(tool, input, error) failure-counter key, and detecting the
//! "empty/truncated tool call" shape used by the output-token circuit
//! breaker.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonicalize a JSON value by sorting object keys recursively, then hash
/// it. Key order in the source value must not split one logical signature
/// into two counters, so this never delegates to `Value`'s own
/// `Display`/`to_string`, whose key order depends on whether `serde_json`'s
/// `preserve_order` feature happens to be active anywhere in the build.
pub fn canonical_signature(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_canonical(value, &mut hasher);
    format!("{:x}", hasher.finalize())
}

fn hash_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => {
            hasher.update(b"b");
            hasher.update([*b as u8]);
        }
        Value::Number(n) => {
            hasher.update(b"i");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        Value::Object(map) => {
            hasher.update(b"{");
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b":");
                hash_canonical(&map[key], hasher);
            }
            hasher.update(b"}");
        }
    }
}

/// A tool call's input is considered empty/truncated iff its JSON value is
/// `Null`, an empty object, or an object whose every value is itself
/// zero-valued (`null`/`false`/`0`/`""`/empty array/empty object),
/// recursively.
pub fn is_truncated_input(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(is_zero_valued),
        _ => false,
    }
}

fn is_zero_valued(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !*b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_zero_valued),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signature_is_stable_across_key_order() {
        let a = json!({"name": "x", "limit": 5});
        let b = json!({"limit": 5, "name": "x"});
        assert_eq!(canonical_signature(&a), canonical_signature(&b));
    }

    #[test]
    fn signature_differs_on_value() {
        let a = json!({"limit": 5});
        let b = json!({"limit": 6});
        assert_ne!(canonical_signature(&a), canonical_signature(&b));
    }

    #[test]
    fn null_and_empty_object_are_truncated() {
        assert!(is_truncated_input(&Value::Null));
        assert!(is_truncated_input(&json!({})));
    }

    #[test]
    fn object_of_zero_values_is_truncated() {
        assert!(is_truncated_input(&json!({"a": 0, "b": "", "c": null, "d": []})));
    }

    #[test]
    fn object_with_one_nonzero_value_is_not_truncated() {
        assert!(!is_truncated_input(&json!({"a": 0, "b": "hello"})));
    }

    #[test]
    fn non_empty_array_is_not_truncated() {
        assert!(!is_truncated_input(&json!([1, 2])));
    }
}

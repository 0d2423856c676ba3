//! Canonical Serialization & Hashing
//!
//! The content hash must be recomputable by a third party from the same
//! inputs, years later, in a different implementation. That requires a
//! field-order-stable serialization: object keys sorted recursively, no
//! insertion-order leakage, then SHA-256 over the bytes.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Recursively sort all object keys
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical byte representation: key-sorted, compact JSON
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    // Compact serialization of an already-canonicalized tree is infallible.
    serde_json::to_vec(&canonicalize(value)).unwrap_or_default()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content hash of a canonical document
pub fn hash_canonical(value: &Value) -> String {
    sha256_hex(&canonical_bytes(value))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_the_hash() {
        let a = json!({"url": "https://x.test", "hash": "abc", "links": 3});
        let b = json!({"links": 3, "hash": "abc", "url": "https://x.test"});
        assert_eq!(hash_canonical(&a), hash_canonical(&b));
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let a = json!({"outer": {"b": 1, "a": {"z": true, "y": false}}});
        let b = json!({"outer": {"a": {"y": false, "z": true}, "b": 1}});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn hashing_is_deterministic_across_calls() {
        let doc = json!({
            "source_url": "https://t.me/leaks",
            "page_hash": "deadbeef",
            "text_length": 4821,
            "archive_url": null,
        });
        let first = hash_canonical(&doc);
        for _ in 0..10 {
            assert_eq!(hash_canonical(&doc), first);
        }
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn value_changes_change_the_hash() {
        let a = json!({"text_length": 100});
        let b = json!({"text_length": 101});
        assert_ne!(hash_canonical(&a), hash_canonical(&b));
    }

    #[test]
    fn arrays_keep_their_order() {
        let a = json!({"links": ["a", "b"]});
        let b = json!({"links": ["b", "a"]});
        assert_ne!(hash_canonical(&a), hash_canonical(&b));
    }
}

// Canonical JSON: sorted keys, no extraneous whitespace, UTF-8. This is the
// exact byte sequence hashed and signed; every caller must agree on it
// bit-for-bit across the wire.
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AnnalinkError, Result};

/// Serialize `value` to its canonical JSON byte form: keys sorted
/// lexicographically at every object level, no whitespace between tokens.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let raw = serde_json::to_value(value)?;
    let sorted = sort_keys(raw);
    serde_json::to_vec(&sorted).map_err(AnnalinkError::from)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> is always representable")
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

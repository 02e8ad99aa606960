//! Content hashing of raw tracker records.
//!
//! A record is serialized to canonical JSON (compact, object keys sorted at
//! every depth) and hashed with BLAKE3. Two records with the same logical
//! content always hash the same regardless of key order in the tracker's
//! response; any change to any field changes the hash.
//!
//! Hash format: `blake3:<64 lowercase hex chars>`.

use serde_json::Value;

/// Prefix carried by every content hash.
pub const HASH_PREFIX: &str = "blake3:";

/// Produce a canonical JSON string from a [`serde_json::Value`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use bugsync_core::hash::canonicalize_json;
///
/// let val = json!({"z": 1, "a": {"c": 3, "b": 2}});
/// assert_eq!(canonicalize_json(&val), r#"{"a":{"b":2,"c":3},"z":1}"#);
/// ```
#[must_use]
pub fn canonicalize_json(value: &Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    buf
}

/// Content hash of a raw bug record.
#[must_use]
pub fn content_hash(record: &Value) -> String {
    let canonical = canonicalize_json(record);
    format!("{HASH_PREFIX}{}", blake3::hash(canonical.as_bytes()))
}

fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            // Scalars serialize identically in compact form.
            buf.push_str(&value.to_string());
        }
        Value::Array(arr) => {
            buf.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            buf.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(&Value::String((*key).clone()).to_string());
                buf.push(':');
                if let Some(val) = map.get(*key) {
                    write_canonical(val, buf);
                }
            }
            buf.push('}');
        }
    }
}

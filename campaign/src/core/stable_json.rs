//! Canonical, stable-key JSON encoding.
//!
//! Every artifact goes through this module: objects are rebuilt with keys in
//! lexicographic order, so identical logical content always serializes to
//! identical bytes regardless of struct field order.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Length of truncated hex digests (run ids, state fingerprints).
pub const DIGEST_LEN: usize = 16;

/// Rebuild a JSON value with every object's keys sorted.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Canonical value for any serializable type.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value> {
    let value = serde_json::to_value(value).context("serialize to json value")?;
    Ok(canonicalize(value))
}

/// Compact single-line encoding (for `.jsonl` streams), without trailing newline.
pub fn to_line<T: Serialize>(value: &T) -> Result<String> {
    let value = to_canonical_value(value)?;
    serde_json::to_string(&value).context("encode json line")
}

/// Pretty document encoding with a trailing newline.
pub fn to_document<T: Serialize>(value: &T) -> Result<String> {
    let value = to_canonical_value(value)?;
    let mut buf = serde_json::to_string_pretty(&value).context("encode json document")?;
    buf.push('\n');
    Ok(buf)
}

/// Truncated hex sha256 of raw bytes.
pub fn short_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut encoded = hex::encode(hasher.finalize());
    encoded.truncate(DIGEST_LEN);
    encoded
}

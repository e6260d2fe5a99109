//! Canonical JSON normalization and digest computation (RFC 8785-class).
//!
//! - UTF-16 code unit ordering for object keys (§3.2.3)
//! - Number normalization (integer-valued floats -> integers; reject NaN/Infinity)
//! - SHA256 hex digest computation
//!
//! Used to compute `Spec.specDigest` / `Run.runDigest` so that two specs with
//! identical stage/step content hash identically.

use crate::error::{DtError, Result};
use sha2::{Digest, Sha256};

fn sort_keys_utf16(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort_by(|a, b| {
                let a_utf16: Vec<u16> = a.encode_utf16().collect();
                let b_utf16: Vec<u16> = b.encode_utf16().collect();
                a_utf16.cmp(&b_utf16)
            });
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys_utf16(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys_utf16).collect())
        }
        other => other.clone(),
    }
}

fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map.iter() {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => {
            let normalized = arr
                .iter()
                .map(normalize_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(serde_json::Value::Array(normalized))
        }
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(serde_json::Value::Number(n.clone()))
            } else if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(DtError::InvalidSpec(
                        "NaN/Infinity not permitted in canonical JSON".to_string(),
                    ));
                }
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Ok(serde_json::Value::Number(serde_json::Number::from(f as i64)))
                } else {
                    Ok(serde_json::Value::Number(n.clone()))
                }
            } else {
                Ok(serde_json::Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Convert a JSON value to canonical form: normalize numbers, sort keys, compact.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    let sorted = sort_keys_utf16(&normalized);
    Ok(serde_json::to_string(&sorted)?)
}

/// SHA256 hex digest of a value's canonical JSON form.
pub fn compute_digest(value: &serde_json::Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_valued_float_normalizes() {
        let input = serde_json::json!({ "value": 1.0 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"value":1}"#);
    }

    #[test]
    fn field_order_is_invariant() {
        let a = serde_json::json!({ "a": 1, "b": 2, "c": 3 });
        let b = serde_json::json!({ "c": 3, "a": 1, "b": 2 });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn array_order_is_preserved() {
        let a = serde_json::json!({ "xs": [3, 1, 2] });
        let b = serde_json::json!({ "xs": [1, 2, 3] });
        assert_ne!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn digest_is_64_hex_chars_and_deterministic() {
        let input = serde_json::json!({ "name": "swap", "version": 2 });
        let d1 = compute_digest(&input).unwrap();
        let d2 = compute_digest(&input).unwrap();
        assert_eq!(d1.len(), 64);
        assert!(d1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(d1, d2);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = serde_json::json!({ "name": "swap" });
        let b = serde_json::json!({ "name": "swap2" });
        assert_ne!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }
}

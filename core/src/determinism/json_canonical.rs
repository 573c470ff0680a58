use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use serde_json::Value;

// Canonical JSON used for audit hashes and document digests:
// - keys sorted lexicographically at every depth
// - no insignificant whitespace
// - integers only; a float in hashed data is a determinism violation
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let normalized = normalize_value(v)?;
    Ok(serde_json::to_string(&normalized)?.into_bytes())
}

pub fn canonical_sha256_hex<T: Serialize>(value: &T) -> CoreResult<String> {
    let bytes = to_canonical_bytes(value)?;
    Ok(super::run_id::sha256_hex(&bytes))
}

fn normalize_value(v: Value) -> CoreResult<Value> {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, vv) in entries {
                out.insert(k, normalize_value(vv)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => arr
            .into_iter()
            .map(normalize_value)
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        Value::Number(n) => Err(CoreError::DeterminismViolation(format!(
            "canonical JSON forbids non-integer number {}",
            n
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let v = json!({"b": 1, "a": {"z": true, "m": [ {"y": 1, "x": 2} ]}});
        let s = String::from_utf8(to_canonical_bytes(&v).unwrap()).unwrap();
        assert_eq!(s, r#"{"a":{"m":[{"x":2,"y":1}],"z":true},"b":1}"#);
    }

    #[test]
    fn floats_are_rejected() {
        let err = to_canonical_bytes(&json!({"ef": 0.45})).unwrap_err();
        assert!(matches!(err, CoreError::DeterminismViolation(_)));
    }
}

// canonical.rs — Deterministic JSON serialization for signed structures
//
// Canonical JSON: sorted object keys, compact format (no whitespace),
// standard JSON string escaping. Certificates, signed attributes and
// timestamp tokens contain only strings, integers, booleans and null, so no
// floating-point normalization is needed.
//
// RULE: every Ed25519 signature and every certificate fingerprint in this
// crate is computed over canonical_bytes(), never over the pretty-printed
// signature entry stored in the package.

use serde::Serialize;
use serde_json::Value;

use crate::error::VerifyError;

/// Serialize a value to canonical JSON bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, VerifyError> {
    let value = serde_json::to_value(value)?;
    Ok(canonical_json(&value).into_bytes())
}

/// Produce canonical JSON from a serde_json::Value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // Value's Display applies standard JSON escaping
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(arr) => {
            out.push('[');
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Map iteration order depends on serde_json features; sort explicitly.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

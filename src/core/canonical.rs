//! Canonical Frame Encoding
//!
//! The bytes that get hashed and signed. Both parties build their frames
//! independently, so the encoding must not depend on how a frame was put
//! together:
//! - Object members sorted by name at every level
//! - No whitespace
//! - Absent values written as `null`
//!
//! The output matches `JSON.stringify(frame, Object.keys(frame).sort())`,
//! which keeps chains produced by browser peers verifiable here.

use serde_json::Value;

/// Encode a JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::with_capacity(160);
    write_value(value, &mut out);
    out
}

/// Canonical bytes of a JSON value (UTF-8 of [`canonical_json`]).
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(name, out);
                out.push(':');
                write_value(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // Scalars: serde_json's compact Display is already canonical.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

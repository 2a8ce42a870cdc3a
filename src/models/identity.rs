//! Entity identity normalization.
//!
//! Upstream APIs emit entity (room) identifiers inconsistently: integers,
//! floats with a zero fraction, numeric strings like `"123.0"`, or plain
//! strings. Every identifier is normalized to one canonical string form
//! before it is used as a comparison or map key.

use serde_json::Value;

/// Normalize a raw JSON identifier value to its canonical string form.
///
/// Rules:
/// - `Null` / empty string → `None` (invalid, dropped from keyed structures)
/// - integral numbers (including float-typed values with a zero fraction)
///   → the plain integer string, e.g. `123.0` → `"123"`; integral floats
///   outside the i64 range keep their original form so distinct huge ids
///   never collide
/// - any other non-empty string is trimmed and used as-is
///
/// Normalization is idempotent: applying it to its own output is a no-op.
pub fn normalize_entity_id(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && in_i64_range(f) {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            } else {
                None
            }
        }
        Value::String(s) => normalize_entity_id_str(s),
        _ => None,
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive;
/// outside this range `f as i64` would saturate and collide distinct ids.
fn in_i64_range(f: f64) -> bool {
    f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Normalize a string-typed identifier (see [`normalize_entity_id`]).
pub fn normalize_entity_id_str(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // "123" and "123.0" both canonicalize to "123"
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i.to_string());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.fract() == 0.0 && in_i64_range(f) {
            return Some(format!("{}", f as i64));
        }
    }

    Some(trimmed.to_string())
}

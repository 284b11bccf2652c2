//! Field decoders that never fail on a type mismatch.
//!
//! A value of the wrong JSON type decodes as `None` so the rest of the
//! document still applies. `null` is the same as a missing field.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

fn value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Option::<Value>::deserialize(deserializer)
}

/// JSON `true`/`false` only.
pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(value(deserializer)?.and_then(|v| v.as_bool()))
}

/// JSON integers only; `3.0` is not an integer.
pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(value(deserializer)?.and_then(|v| v.as_i64()))
}

/// Any JSON number.
pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(value(deserializer)?.and_then(|v| v.as_f64()))
}

/// Truthiness: `true`, non-zero numbers, non-empty strings, arrays and objects.
pub fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match value(deserializer)? {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    })
}

/// A nested group. Anything but an object leaves every field of the group missing.
pub fn group<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match value(deserializer)? {
        Some(v @ Value::Object(_)) => serde_json::from_value(v).unwrap_or_default(),
        _ => T::default(),
    })
}

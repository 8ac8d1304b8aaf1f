//! Field decoders tolerant of the remote service's loose JSON typing.
//!
//! Integers sometimes arrive as numeric strings, strings as `null`, and
//! absent nested objects as empty arrays.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Integer from a number, numeric string, bool or null (0).
pub(crate) fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    value_to_int(Value::deserialize(d)?).map_err(D::Error::custom)
}

/// String from a string, number or null ("").
pub(crate) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if b { "1".into() } else { "0".into() }),
        other => Err(D::Error::custom(format!("expected string, got {other}"))),
    }
}

/// Nested object, where `null`, `[]` and `{}` all mean absent.
pub(crate) fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        value => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
    }
}

/// List from an array, or from the values of an object keyed by index.
pub(crate) fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    indexed_values(Value::deserialize(d)?, &[])
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
        .collect()
}

/// Reason ids from either `{"id": "label"}` or `[id, ...]`.
pub(crate) fn reason_ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<i64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .keys()
            .map(|key| key.trim().parse::<i64>().map_err(D::Error::custom))
            .collect(),
        Value::Array(items) => items.into_iter().map(|v| value_to_int(v).map_err(D::Error::custom)).collect(),
        other => Err(D::Error::custom(format!("expected reason map, got {other}"))),
    }
}

pub(crate) fn value_to_int(value: Value) -> Result<i64, String> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| format!("integer out of range: {n}")),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s.trim().parse().map_err(|_| format!("expected integer, got \"{s}\"")),
        other => Err(format!("expected integer, got {other}")),
    }
}

/// Elements of a list that may be an array or an index-keyed object.
///
/// Object keys listed in `skip` are header elements and are dropped.
/// Numeric keys keep their numeric order.
pub(crate) fn indexed_values(value: Value, skip: &[&str]) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut entries: Vec<(Option<u64>, String, Value)> = map
                .into_iter()
                .filter(|(key, _)| !skip.contains(&key.as_str()))
                .map(|(key, value)| (key.parse().ok(), key, value))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            entries.into_iter().map(|(_, _, value)| value).collect()
        }
        _ => Vec::new(),
    }
}

//! Normalization of upstream response envelopes.
//!
//! Services answer either `{message, data: ...}` or the bare payload. Lists
//! come as `{data: {items: [...]}}` or a bare array.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// The payload of a possibly enveloped object response.
pub fn data(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// The items of a possibly enveloped list response; anything else is empty.
pub fn items(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Object(mut data)) => match data.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Decode each item, skipping (and logging) the ones that do not fit `T`.
pub fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::warn!(what, position, error = %err, "skipping malformed upstream item");
                None
            }
        })
        .collect()
}

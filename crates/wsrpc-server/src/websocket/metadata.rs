//! Per-client key/value side table.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Values stashed on a client across requests, such as authentication claims.
///
/// Typed getters return `None` when the key is missing or holds a value of
/// another type.
#[derive(Debug, Default)]
pub struct Metadata {
    values: RwLock<HashMap<String, Value>>,
}

impl Metadata {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let _ = self.values.write().insert(key.into(), value.into());
    }

    /// Raw value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Remove `key`, returning what was stored.
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// String value under `key`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Integer value under `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.read().get(key).and_then(Value::as_i64)
    }

    /// Float value under `key`. Integers are widened.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.read().get(key).and_then(Value::as_f64)
    }

    /// Boolean value under `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.read().get(key).and_then(Value::as_bool)
    }

    /// Deserialize the value under `key` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).ok()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

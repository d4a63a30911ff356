//! PropertyMap and PropertyDict: the key-value store on nodes and relationships.

use indexmap::IndexMap;

use super::Value;

/// An insertion-ordered map of property names to values.
pub type PropertyMap = IndexMap<String, Value>;

/// Property storage for an entity.
///
/// Behaves like a `PropertyMap` with one rule on top: `Null` is the absence
/// of a value. Writing `Null` removes the key and reading a missing key
/// yields `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDict {
    inner: PropertyMap,
}

impl PropertyDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, or `Value::Null` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.inner.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Set `key` to `value`. A `Null` value removes the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value: Value = value.into();
        match value {
            Value::Null => {
                self.inner.shift_remove(&key);
            }
            value => {
                self.inner.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inner.shift_remove(key)
    }

    /// Insert `default` unless `key` is already present; returns the stored value.
    pub fn setdefault(&mut self, key: impl Into<String>, default: impl Into<Value>) -> Value {
        let key = key.into();
        if let Some(existing) = self.inner.get(&key) {
            return existing.clone();
        }
        let default = default.into();
        self.set(key, default.clone());
        default
    }

    /// Merge `other` over this dict, applying the same `Null` rule as `set`.
    pub fn update<K, V>(&mut self, other: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in other {
            self.set(k, v);
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of the stored values.
    pub fn to_map(&self) -> PropertyMap {
        self.inner.clone()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyDict {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = PropertyDict::new();
        dict.update(iter);
        dict
    }
}

impl From<PropertyMap> for PropertyDict {
    fn from(map: PropertyMap) -> Self {
        map.into_iter().collect()
    }
}

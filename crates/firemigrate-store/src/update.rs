//! Field-level update mappings and the sentinels that can appear in them.

use std::collections::BTreeMap;

use crate::Value;

/// Value slot of a field update.
///
/// `Delete` and `ServerTimestamp` are sentinels: only store adapters
/// interpret them.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    /// Write this value.
    Set(Value),
    /// Remove the field from the document.
    Delete,
    /// Replace with the store's commit time.
    ServerTimestamp,
}

impl From<Value> for UpdateValue {
    fn from(v: Value) -> Self {
        UpdateValue::Set(v)
    }
}

/// Ordered set of field updates for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMap {
    fields: BTreeMap<String, UpdateValue>,
}

impl UpdateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: UpdateValue) -> &mut Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.insert(field, UpdateValue::Set(value.into()))
    }

    pub fn delete(&mut self, field: impl Into<String>) -> &mut Self {
        self.insert(field, UpdateValue::Delete)
    }

    pub fn server_timestamp(&mut self, field: impl Into<String>) -> &mut Self {
        self.insert(field, UpdateValue::ServerTimestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&UpdateValue> {
        self.fields.get(field)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UpdateValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

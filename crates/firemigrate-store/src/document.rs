//! Document snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{DocumentPath, Field, Value};

/// A point-in-time snapshot of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocumentPath,
    pub fields: BTreeMap<String, Value>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(path: DocumentPath, fields: BTreeMap<String, Value>) -> Self {
        Self {
            path,
            fields,
            create_time: None,
            update_time: None,
        }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Look up a top-level field.
    pub fn field(&self, name: &str) -> Field<'_> {
        Field::from_lookup(self.fields.get(name))
    }
}

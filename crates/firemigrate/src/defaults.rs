//! Filling in missing fields with documented defaults.

use firemigrate_store::{CollectionPath, Document, DocumentStore, UpdateMap, UpdateValue, Value};
use tracing::{debug, info};

use crate::{DocumentWriter, MigrationContext, MigrationError, MigrationStats};

/// Default written into a missing field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Str(&'static str),
    EmptyArray,
    EmptyMap,
    Null,
    /// The store's commit time.
    ServerTimestamp,
}

impl DefaultValue {
    pub fn to_update(self, ctx: &MigrationContext) -> UpdateValue {
        match self {
            DefaultValue::Bool(b) => UpdateValue::Set(Value::Boolean(b)),
            DefaultValue::Integer(i) => UpdateValue::Set(Value::Integer(i)),
            DefaultValue::Str(s) => UpdateValue::Set(Value::from(s)),
            DefaultValue::EmptyArray => UpdateValue::Set(Value::empty_array()),
            DefaultValue::EmptyMap => UpdateValue::Set(Value::empty_map()),
            DefaultValue::Null => UpdateValue::Set(Value::Null),
            DefaultValue::ServerTimestamp => ctx.server_timestamp(),
        }
    }

    /// Description for log output.
    pub fn describe(self) -> String {
        match self {
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Str(s) => format!("{s:?}"),
            DefaultValue::EmptyArray => "empty array".to_string(),
            DefaultValue::EmptyMap => "empty map".to_string(),
            DefaultValue::Null => "null".to_string(),
            DefaultValue::ServerTimestamp => "current time".to_string(),
        }
    }
}

/// A field that must be present, and what to write when it is not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDefault {
    pub field: &'static str,
    pub default: DefaultValue,
}

impl FieldDefault {
    pub const fn new(field: &'static str, default: DefaultValue) -> Self {
        Self { field, default }
    }
}

/// Minimal update that gives `doc` every missing (absent or null) field.
pub fn missing_field_updates(
    doc: &Document,
    defaults: &[FieldDefault],
    ctx: &MigrationContext,
) -> UpdateMap {
    let mut updates = UpdateMap::new();
    for default in defaults {
        if doc.field(default.field).is_missing() {
            debug!(
                document = %doc.path,
                field = default.field,
                default = %default.default.describe(),
                "missing field"
            );
            updates.insert(default.field, default.default.to_update(ctx));
        }
    }
    updates
}

/// Scan `collection` and default missing fields on every document.
///
/// Counts one `scanned` per document. Returns the snapshots so callers can
/// descend into subcollections. Failing to list the collection is an error;
/// failing to update a document is only counted.
pub async fn default_missing_fields(
    db: &dyn DocumentStore,
    ctx: &MigrationContext,
    collection: &CollectionPath,
    defaults: &[FieldDefault],
    writer: &mut DocumentWriter<'_>,
    stats: &mut MigrationStats,
) -> Result<Vec<Document>, MigrationError> {
    let documents = db.list_documents(collection).await?;
    info!(collection = %collection, count = documents.len(), "processing documents");

    for doc in &documents {
        stats.scanned += 1;
        let updates = missing_field_updates(doc, defaults, ctx);
        writer.update(&doc.path, updates, stats).await;
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    const DEFAULTS: &[FieldDefault] = &[
        FieldDefault::new("friends", DefaultValue::EmptyArray),
        FieldDefault::new("isAdmin", DefaultValue::Bool(false)),
    ];

    fn doc(fields: &[(&str, Value)]) -> Document {
        Document::new(
            CollectionPath::root("users").doc("u1"),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_absent_and_null_both_defaulted() {
        let d = doc(&[("friends", Value::Null)]);
        let updates = missing_field_updates(&d, DEFAULTS, &MigrationContext::apply());
        assert_eq!(updates.field_names(), vec!["friends", "isAdmin"]);
        assert_eq!(
            updates.get("isAdmin"),
            Some(&UpdateValue::Set(Value::Boolean(false)))
        );
    }

    #[test]
    fn test_present_values_untouched() {
        // Falsy values still count as present.
        let d = doc(&[
            ("friends", Value::empty_array()),
            ("isAdmin", Value::Boolean(false)),
        ]);
        let updates = missing_field_updates(&d, DEFAULTS, &MigrationContext::apply());
        assert!(updates.is_empty());
    }

    #[test]
    fn test_server_timestamp_uses_sentinel() {
        let defaults = [FieldDefault::new("joinedAt", DefaultValue::ServerTimestamp)];
        let updates = missing_field_updates(&doc(&[]), &defaults, &MigrationContext::apply());
        assert_eq!(updates.get("joinedAt"), Some(&UpdateValue::ServerTimestamp));
    }

    #[test]
    fn test_describe() {
        assert_eq!(DefaultValue::Str("circle").describe(), "\"circle\"");
        assert_eq!(DefaultValue::ServerTimestamp.describe(), "current time");
        assert_eq!(DefaultValue::Integer(4278190080).describe(), "4278190080");
    }
}

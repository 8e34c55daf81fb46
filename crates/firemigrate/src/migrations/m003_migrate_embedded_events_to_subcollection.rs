//! Move events embedded in calendar documents into the `events` subcollection.
//!
//! Legacy calendars carry an `events` map of date key to event list:
//!
//! ```text
//! calendars/{id}
//!     events: { "2024-01-15T00:00:00.000Z": [ { name, time, ... }, ... ] }
//! ```
//!
//! Every event becomes `calendars/{id}/events/{eventId}` with the full event
//! field set, after which the `events` field is removed from the calendar.

use std::collections::BTreeMap;

use async_trait::async_trait;
use firemigrate_store::{
    CollectionPath, DocumentPath, DocumentStore, Field, StoreError, UpdateMap, Value, WriteBatch,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::m002_add_missing_calendar_event_fields::{CALENDARS, DEFAULT_EVENT_COLOR, EVENTS};
use crate::{Migration, MigrationContext, MigrationError, MigrationStats};

/// Extra counter: events moved (or that would be moved).
pub const EVENTS_MIGRATED: &str = "events_migrated";

const UNTITLED: &str = "Untitled Event";

/// Namespace for event IDs derived from an event's position in a calendar.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b9e_4d3a_5c8f_9a51_7e0d_3b62_c4a9);

type Fields = BTreeMap<String, Value>;

/// An embedded event and where it sits in the legacy map.
struct EmbeddedEvent<'a> {
    date_key: &'a str,
    index: usize,
    fields: &'a Fields,
}

pub struct MigrateEmbeddedEventsToSubcollection;

#[async_trait]
impl Migration for MigrateEmbeddedEventsToSubcollection {
    fn name(&self) -> &'static str {
        "003_migrate_embedded_events_to_subcollection"
    }

    fn description(&self) -> &'static str {
        "Move events embedded in calendar documents into the events subcollection"
    }

    async fn run(
        &self,
        db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        let mut stats = MigrationStats::new();
        stats.add_extra(EVENTS_MIGRATED, 0);

        let calendars = db.list_documents(&CollectionPath::root(CALENDARS)).await?;
        info!(count = calendars.len(), "processing calendar documents");

        for calendar in &calendars {
            stats.scanned += 1;

            let embedded = match calendar.field(EVENTS) {
                Field::Present(Value::Map(map)) => map,
                Field::Present(other) => {
                    warn!(
                        calendar = %calendar.path,
                        kind = other.type_name(),
                        "events field is not a map, skipping"
                    );
                    continue;
                }
                Field::Absent | Field::Null => continue,
            };

            let items = embedded_events(&calendar.path, embedded);
            let count = items.len() as u64;

            if ctx.is_dry_run() {
                info!(calendar = %calendar.path, count, "would migrate embedded events");
                stats.add_extra(EVENTS_MIGRATED, count);
                stats.updated += 1;
                continue;
            }

            match move_events(db, ctx, &calendar.path, &items).await {
                Ok(migrated) => {
                    info!(calendar = %calendar.path, migrated, "migrated events to subcollection");
                    stats.add_extra(EVENTS_MIGRATED, migrated);
                    stats.updated += 1;
                }
                Err(e) => {
                    warn!(calendar = %calendar.path, error = %e, "error migrating events");
                    stats.errors += 1;
                }
            }
        }

        info!(total = stats.extra(EVENTS_MIGRATED), "embedded events");
        Ok(stats)
    }
}

/// Flatten the date-keyed map into events.
///
/// Only map-valued items inside list values are events; anything else is
/// logged and left behind.
fn embedded_events<'a>(calendar: &DocumentPath, embedded: &'a Fields) -> Vec<EmbeddedEvent<'a>> {
    let mut items = Vec::new();
    for (date_key, list) in embedded {
        let Some(list) = list.as_array() else {
            warn!(
                calendar = %calendar,
                date_key = %date_key,
                "event list is not an array, skipping"
            );
            continue;
        };
        for (index, item) in list.iter().enumerate() {
            match item.as_map() {
                Some(fields) => items.push(EmbeddedEvent {
                    date_key: date_key.as_str(),
                    index,
                    fields,
                }),
                None => warn!(
                    calendar = %calendar,
                    date_key = %date_key,
                    kind = item.type_name(),
                    "embedded event is not a map, skipping"
                ),
            }
        }
    }
    items
}

/// Upsert every event, then drop the embedded field.
///
/// The field is only removed once all event writes have committed.
async fn move_events(
    db: &dyn DocumentStore,
    ctx: &MigrationContext,
    calendar: &DocumentPath,
    items: &[EmbeddedEvent<'_>],
) -> Result<u64, StoreError> {
    let events = calendar.collection(EVENTS);
    let mut migrated = 0;

    for chunk in items.chunks(db.max_batch_size().max(1)) {
        let mut batch = WriteBatch::new();
        for event in chunk {
            let id = event_id(calendar, event.date_key, event.index, event.fields);
            let fields = normalize_event(event.fields, &id, event.date_key);
            batch.set(events.doc(id), fields);
        }
        db.commit(batch).await?;
        migrated += chunk.len() as u64;
    }

    let mut updates = UpdateMap::new();
    updates.insert(EVENTS, ctx.delete_field());
    db.update_document(calendar, &updates).await?;

    Ok(migrated)
}

/// Existing `id` if it is usable as a document ID, else a UUID v5 over the
/// event's position, so re-running after a partial failure rewrites the same
/// documents.
pub(crate) fn event_id(
    calendar: &DocumentPath,
    date_key: &str,
    index: usize,
    event: &Fields,
) -> String {
    Field::from_lookup(event.get("id"))
        .non_empty_str()
        .filter(|id| !id.contains('/'))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let name = format!("{calendar}/{date_key}/{index}");
            Uuid::new_v5(&EVENT_ID_NAMESPACE, name.as_bytes()).to_string()
        })
}

/// Full event document with defaults for blank fields.
///
/// Blank means absent, null, or an empty string. `color` only defaults when
/// absent or null.
pub(crate) fn normalize_event(event: &Fields, id: &str, date_key: &str) -> Fields {
    let get = |name: &str| Field::from_lookup(event.get(name));

    let mut fields = Fields::new();
    fields.insert("id".into(), Value::from(id));
    fields.insert("name".into(), or_blank(get("name"), Value::from(UNTITLED)));
    fields.insert("time".into(), or_blank(get("time"), Value::from(date_key)));
    fields.insert(
        "color".into(),
        get("color")
            .value()
            .cloned()
            .unwrap_or(Value::Integer(DEFAULT_EVENT_COLOR)),
    );
    fields.insert("shape".into(), or_blank(get("shape"), Value::from("circle")));
    fields.insert(
        "recurrence".into(),
        or_blank(get("recurrence"), Value::from("none")),
    );
    fields.insert(
        "recurrenceEndDate".into(),
        or_blank(get("recurrenceEndDate"), Value::Null),
    );
    // Field name matches the app's schema.
    fields.insert("atendees".into(), or_blank(get("atendees"), Value::Null));
    fields
}

fn or_blank(field: Field<'_>, default: Value) -> Value {
    match field.value() {
        Some(Value::String(s)) if s.is_empty() => default,
        Some(v) => v.clone(),
        None => default,
    }
}

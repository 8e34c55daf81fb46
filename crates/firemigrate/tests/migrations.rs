//! Shipped migrations against the in-memory store.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use firemigrate::migrations::{
    AddMissingCalendarEventFields, AddMissingUserFields, DEFAULT_EVENT_COLOR, EVENTS_MIGRATED,
    MigrateEmbeddedEventsToSubcollection, Template,
};
use firemigrate::{Migration, MigrationContext, MigrationStats};
use firemigrate_store::{CollectionPath, DocumentPath, MemoryStore, Value};
use pretty_assertions::assert_eq;

type Fields = BTreeMap<String, Value>;

fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn user(id: &str) -> DocumentPath {
    CollectionPath::root("users").doc(id)
}

fn calendar(id: &str) -> DocumentPath {
    CollectionPath::root("calendars").doc(id)
}

fn event(calendar_id: &str, id: &str) -> DocumentPath {
    calendar(calendar_id).collection("events").doc(id)
}

async fn run(migration: &dyn Migration, store: &MemoryStore, dry_run: bool) -> MigrationStats {
    migration
        .run(store, &MigrationContext::new(dry_run))
        .await
        .unwrap()
}

fn complete_user() -> Fields {
    fields(&[
        (
            "joinedAt",
            Value::from(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()),
        ),
        ("friends", Value::from(vec!["u2"])),
        ("isAdmin", Value::Boolean(true)),
    ])
}

async fn seed_users() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(user("empty"), Fields::new()).await;
    store
        .insert(
            user("nulls"),
            fields(&[("friends", Value::Null), ("isAdmin", Value::Null)]),
        )
        .await;
    store.insert(user("complete"), complete_user()).await;
    store
}

// =============================================================================
// 001: user fields
// =============================================================================

#[tokio::test]
async fn test_users_get_missing_fields() {
    let store = seed_users().await;

    let stats = run(&AddMissingUserFields, &store, false).await;

    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.errors, 0);

    for id in ["empty", "nulls"] {
        let doc = store.fields(&user(id)).await.unwrap();
        assert!(matches!(doc.get("joinedAt"), Some(Value::Timestamp(_))));
        assert_eq!(doc.get("friends"), Some(&Value::empty_array()));
        assert_eq!(doc.get("isAdmin"), Some(&Value::Boolean(false)));
    }

    assert_eq!(store.fields(&user("complete")).await.unwrap(), complete_user());
}

#[tokio::test]
async fn test_users_second_run_is_noop() {
    let store = seed_users().await;
    run(&AddMissingUserFields, &store, false).await;
    let writes = store.writes_applied().await;

    let stats = run(&AddMissingUserFields, &store, false).await;

    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.updated, 0);
    assert_eq!(store.writes_applied().await, writes);
}

#[tokio::test]
async fn test_users_dry_run_matches_apply() {
    let dry_store = seed_users().await;
    let apply_store = seed_users().await;

    let dry = run(&AddMissingUserFields, &dry_store, true).await;
    let applied = run(&AddMissingUserFields, &apply_store, false).await;

    assert_eq!(dry, applied);
    assert_eq!(dry_store.commit_calls().await, 0);
    assert!(dry_store.fields(&user("empty")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_update_is_isolated() {
    let store = MemoryStore::new();
    for id in ["d1", "d2", "d3"] {
        store.insert(user(id), Fields::new()).await;
    }
    store.reject_writes_to(user("d2"), "permission denied").await;

    let stats = run(&AddMissingUserFields, &store, false).await;

    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.errors, 1);
    assert!(store.fields(&user("d2")).await.unwrap().is_empty());
    for id in ["d1", "d3"] {
        let doc = store.fields(&user(id)).await.unwrap();
        assert_eq!(doc.get("isAdmin"), Some(&Value::Boolean(false)));
    }
}

#[tokio::test]
async fn test_empty_collection() {
    let store = MemoryStore::new();
    let stats = run(&AddMissingUserFields, &store, false).await;
    assert_eq!(stats, MigrationStats::new());
}

// =============================================================================
// 002: calendar and event fields
// =============================================================================

async fn seed_calendar_with_event() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert(calendar("c1"), fields(&[("name", Value::from("Work"))]))
        .await;
    store
        .insert(event("c1", "e1"), fields(&[("name", Value::from("Standup"))]))
        .await;
    store
}

#[tokio::test]
async fn test_calendar_and_event_defaults() {
    let store = seed_calendar_with_event().await;

    let stats = run(&AddMissingCalendarEventFields, &store, false).await;

    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.errors, 0);

    let cal = store.fields(&calendar("c1")).await.unwrap();
    assert_eq!(cal.get("sharedWith"), Some(&Value::empty_array()));

    let ev = store.fields(&event("c1", "e1")).await.unwrap();
    assert_eq!(ev.get("color"), Some(&Value::Integer(DEFAULT_EVENT_COLOR)));
    assert_eq!(ev.get("shape"), Some(&Value::from("circle")));
    assert_eq!(ev.get("recurrence"), Some(&Value::from("none")));
    assert_eq!(ev.get("name"), Some(&Value::from("Standup")));
}

#[tokio::test]
async fn test_calendar_events_dry_run_and_idempotence() {
    let store = seed_calendar_with_event().await;

    let dry = run(&AddMissingCalendarEventFields, &store, true).await;
    assert_eq!(store.commit_calls().await, 0);

    let applied = run(&AddMissingCalendarEventFields, &store, false).await;
    assert_eq!(dry, applied);

    let again = run(&AddMissingCalendarEventFields, &store, false).await;
    assert_eq!(again.scanned, 2);
    assert_eq!(again.updated, 0);
}

#[tokio::test]
async fn test_partial_failure_across_calendars() {
    let store = MemoryStore::new();
    for id in ["d1", "d2", "d3"] {
        store.insert(calendar(id), Fields::new()).await;
    }
    store.reject_writes_to(calendar("d2"), "unavailable").await;

    let stats = run(&AddMissingCalendarEventFields, &store, false).await;

    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.errors, 1);
    for id in ["d1", "d3"] {
        let cal = store.fields(&calendar(id)).await.unwrap();
        assert_eq!(cal.get("sharedWith"), Some(&Value::empty_array()));
    }
}

// =============================================================================
// 003: embedded events to subcollection
// =============================================================================

fn embedded(pairs: &[(&str, Vec<Fields>)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(date, events)| {
                (
                    date.to_string(),
                    Value::Array(events.iter().cloned().map(Value::Map).collect()),
                )
            })
            .collect(),
    )
}

async fn seed_legacy_calendar() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert(
            calendar("c1"),
            fields(&[
                ("name", Value::from("Work")),
                (
                    "events",
                    embedded(&[(
                        "2024-01-15T00:00:00.000Z",
                        vec![fields(&[("name", Value::from("A"))])],
                    )]),
                ),
            ]),
        )
        .await;
    store
}

#[tokio::test]
async fn test_embedded_event_moves_to_subcollection() {
    let store = seed_legacy_calendar().await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.extra(EVENTS_MIGRATED), 1);

    let cal = store.fields(&calendar("c1")).await.unwrap();
    assert!(!cal.contains_key("events"));
    assert_eq!(cal.get("name"), Some(&Value::from("Work")));

    let events = firemigrate_store::DocumentStore::list_documents(
        &store,
        &calendar("c1").collection("events"),
    )
    .await
    .unwrap();
    assert_eq!(events.len(), 1);

    let ev = &events[0];
    let id = ev.id().to_string();
    assert!(uuid_like(&id), "expected synthesized id, got {id}");
    assert_eq!(
        ev.fields,
        fields(&[
            ("id", Value::from(id.as_str())),
            ("name", Value::from("A")),
            ("time", Value::from("2024-01-15T00:00:00.000Z")),
            ("color", Value::Integer(DEFAULT_EVENT_COLOR)),
            ("shape", Value::from("circle")),
            ("recurrence", Value::from("none")),
            ("recurrenceEndDate", Value::Null),
            ("atendees", Value::Null),
        ])
    );
}

fn uuid_like(id: &str) -> bool {
    id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_embedded_events_second_run_is_noop() {
    let store = seed_legacy_calendar().await;
    run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;
    let writes = store.writes_applied().await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.extra(EVENTS_MIGRATED), 0);
    assert!(stats.extra.contains_key(EVENTS_MIGRATED));
    assert_eq!(store.writes_applied().await, writes);
}

#[tokio::test]
async fn test_embedded_events_dry_run_counts_only() {
    let store = MemoryStore::new();
    store
        .insert(
            calendar("c1"),
            fields(&[(
                "events",
                embedded(&[
                    (
                        "2024-01-15",
                        vec![
                            fields(&[("id", Value::from("e1"))]),
                            fields(&[("id", Value::from("e2"))]),
                        ],
                    ),
                    ("2024-01-16", vec![fields(&[("id", Value::from("e3"))])]),
                ]),
            )]),
        )
        .await;
    store.insert(calendar("c2"), Fields::new()).await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, true).await;

    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.extra(EVENTS_MIGRATED), 3);
    assert_eq!(store.commit_calls().await, 0);
    assert!(store.fields(&event("c1", "e1")).await.is_none());
}

#[tokio::test]
async fn test_embedded_events_keep_existing_ids() {
    let store = MemoryStore::new();
    store
        .insert(
            calendar("c1"),
            fields(&[(
                "events",
                embedded(&[(
                    "2024-01-15",
                    vec![fields(&[
                        ("id", Value::from("e1")),
                        ("name", Value::from("Review")),
                        ("color", Value::Integer(0)),
                    ])],
                )]),
            )]),
        )
        .await;

    run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    let ev = store.fields(&event("c1", "e1")).await.unwrap();
    assert_eq!(ev.get("name"), Some(&Value::from("Review")));
    assert_eq!(ev.get("color"), Some(&Value::Integer(0)));
    assert_eq!(ev.get("time"), Some(&Value::from("2024-01-15")));
}

#[tokio::test]
async fn test_failed_event_write_keeps_embedded_field() {
    let store = MemoryStore::new();
    for id in ["c1", "c2"] {
        store
            .insert(
                calendar(id),
                fields(&[(
                    "events",
                    embedded(&[("2024-01-15", vec![fields(&[("id", Value::from("e1"))])])]),
                )]),
            )
            .await;
    }
    store.reject_writes_to(event("c1", "e1"), "denied").await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.extra(EVENTS_MIGRATED), 1);

    // c1 still has its legacy field, so a later run can finish it.
    assert!(store.fields(&calendar("c1")).await.unwrap().contains_key("events"));
    assert!(!store.fields(&calendar("c2")).await.unwrap().contains_key("events"));
    assert!(store.fields(&event("c2", "e1")).await.is_some());
}

#[tokio::test]
async fn test_rerun_after_failed_field_delete_reuses_event_ids() {
    let store = seed_legacy_calendar().await;
    let events = calendar("c1").collection("events");
    // Event batch commits; removing the legacy field does not.
    store.reject_writes_to(calendar("c1"), "unavailable").await;

    let first = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;
    assert_eq!(first.errors, 1);
    assert_eq!(first.updated, 0);
    assert!(store.fields(&calendar("c1")).await.unwrap().contains_key("events"));
    let moved = firemigrate_store::DocumentStore::list_documents(&store, &events)
        .await
        .unwrap();
    assert_eq!(moved.len(), 1);

    store.clear_rejections().await;
    let second = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(second.errors, 0);
    assert_eq!(second.updated, 1);
    assert!(!store.fields(&calendar("c1")).await.unwrap().contains_key("events"));
    let after = firemigrate_store::DocumentStore::list_documents(&store, &events)
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id(), moved[0].id());
}

#[tokio::test]
async fn test_events_split_across_batches() {
    let store = MemoryStore::new().with_max_batch_size(2);
    let events: Vec<Fields> = (0..5)
        .map(|i| fields(&[("id", Value::from(format!("e{i}")))]))
        .collect();
    store
        .insert(
            calendar("c1"),
            fields(&[("events", embedded(&[("2024-01-15", events)]))]),
        )
        .await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(stats.extra(EVENTS_MIGRATED), 5);
    // Three event batches plus the field delete.
    assert_eq!(store.commit_calls().await, 4);
    for i in 0..5 {
        assert!(store.fields(&event("c1", &format!("e{i}"))).await.is_some());
    }
}

#[tokio::test]
async fn test_non_map_events_field_skipped() {
    let store = MemoryStore::new();
    store
        .insert(
            calendar("c1"),
            fields(&[("events", Value::from("legacy"))]),
        )
        .await;

    let stats = run(&MigrateEmbeddedEventsToSubcollection, &store, false).await;

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(store.commit_calls().await, 0);
}

// =============================================================================
// Template
// =============================================================================

#[tokio::test]
async fn test_template_defaults_its_placeholder_collection() {
    let store = MemoryStore::new();
    let doc = CollectionPath::root("your_collection").doc("x");
    store.insert(doc.clone(), Fields::new()).await;

    let stats = run(&Template, &store, false).await;

    assert_eq!(stats.updated, 1);
    assert_eq!(
        store.fields(&doc).await.unwrap().get("someField"),
        Some(&Value::from("default_value"))
    );
}

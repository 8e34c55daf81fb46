//! Give calendars `sharedWith` and their events `color`, `shape`, and `recurrence`.

use async_trait::async_trait;
use firemigrate_store::{CollectionPath, DocumentStore};
use tracing::warn;

use crate::defaults::{DefaultValue, FieldDefault, default_missing_fields};
use crate::{DocumentWriter, Migration, MigrationContext, MigrationError, MigrationStats};

pub(crate) const CALENDARS: &str = "calendars";
pub(crate) const EVENTS: &str = "events";

/// Opaque black, `0xFF000000`.
pub const DEFAULT_EVENT_COLOR: i64 = 4_278_190_080;

const CALENDAR_DEFAULTS: &[FieldDefault] =
    &[FieldDefault::new("sharedWith", DefaultValue::EmptyArray)];

const EVENT_DEFAULTS: &[FieldDefault] = &[
    FieldDefault::new("color", DefaultValue::Integer(DEFAULT_EVENT_COLOR)),
    FieldDefault::new("shape", DefaultValue::Str("circle")),
    FieldDefault::new("recurrence", DefaultValue::Str("none")),
];

pub struct AddMissingCalendarEventFields;

#[async_trait]
impl Migration for AddMissingCalendarEventFields {
    fn name(&self) -> &'static str {
        "002_add_missing_calendar_event_fields"
    }

    fn description(&self) -> &'static str {
        "Add missing sharedWith to calendars and color, shape, and recurrence to their events"
    }

    async fn run(
        &self,
        db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        let mut stats = MigrationStats::new();
        let calendars_path = CollectionPath::root(CALENDARS);
        let mut writer = DocumentWriter::direct(db, ctx);

        let calendars = default_missing_fields(
            db,
            ctx,
            &calendars_path,
            CALENDAR_DEFAULTS,
            &mut writer,
            &mut stats,
        )
        .await?;

        for calendar in &calendars {
            let events = calendar.path.collection(EVENTS);
            if let Err(e) =
                default_missing_fields(db, ctx, &events, EVENT_DEFAULTS, &mut writer, &mut stats)
                    .await
            {
                // One unreadable subcollection should not stop the others.
                warn!(collection = %events, error = %e, "error listing events");
                stats.errors += 1;
            }
        }

        Ok(stats)
    }
}

//! Shipped migrations.

mod m001_add_missing_user_fields;
mod m002_add_missing_calendar_event_fields;
mod m003_migrate_embedded_events_to_subcollection;
mod template;

pub use m001_add_missing_user_fields::AddMissingUserFields;
pub use m002_add_missing_calendar_event_fields::{
    AddMissingCalendarEventFields, DEFAULT_EVENT_COLOR,
};
pub use m003_migrate_embedded_events_to_subcollection::{
    EVENTS_MIGRATED, MigrateEmbeddedEventsToSubcollection,
};
pub use template::Template;

use crate::Migration;

/// Every shipped migration, including the `_template` scaffold.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(AddMissingUserFields),
        Box::new(AddMissingCalendarEventFields),
        Box::new(MigrateEmbeddedEventsToSubcollection),
        Box::new(Template),
    ]
}

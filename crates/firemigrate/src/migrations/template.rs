//! Starting point for new migrations.
//!
//! Copy this file to `mNNN_short_description.rs`, rename the struct, give it
//! a name of the form `NNN_short_description`, and add it to
//! [`super::all`]. Names starting with `_` are never run, so this scaffold
//! stays registered without effect.
//!
//! Common patterns:
//!
//! - add a field with a default: list it in a [`FieldDefault`] slice;
//! - delete a field: `updates.insert("old", ctx.delete_field())`;
//! - rename a field: set the new name from the old value, delete the old;
//! - stamp the commit time: `updates.insert("createdAt", ctx.server_timestamp())`;
//! - walk a subcollection: `doc.path.collection("name")`.

use async_trait::async_trait;
use firemigrate_store::{CollectionPath, DocumentStore};

use crate::defaults::{DefaultValue, FieldDefault, default_missing_fields};
use crate::{DocumentWriter, Migration, MigrationContext, MigrationError, MigrationStats};

const COLLECTION: &str = "your_collection";

const DEFAULTS: &[FieldDefault] = &[FieldDefault::new(
    "someField",
    DefaultValue::Str("default_value"),
)];

pub struct Template;

#[async_trait]
impl Migration for Template {
    fn name(&self) -> &'static str {
        "_template"
    }

    fn description(&self) -> &'static str {
        "Scaffold for new migrations (never run)"
    }

    async fn run(
        &self,
        db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        let mut stats = MigrationStats::new();
        // Use `DocumentWriter::direct` when each document needs its own round trip.
        let mut writer = DocumentWriter::batched(db, ctx);

        default_missing_fields(
            db,
            ctx,
            &CollectionPath::root(COLLECTION),
            DEFAULTS,
            &mut writer,
            &mut stats,
        )
        .await?;
        writer.finish(&mut stats).await;

        Ok(stats)
    }
}

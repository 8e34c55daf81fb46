//! Give every user document `joinedAt`, `friends`, and `isAdmin`.

use async_trait::async_trait;
use firemigrate_store::{CollectionPath, DocumentStore};

use crate::defaults::{DefaultValue, FieldDefault, default_missing_fields};
use crate::{DocumentWriter, Migration, MigrationContext, MigrationError, MigrationStats};

pub(crate) const USERS: &str = "users";

/// `photoUrl` is nullable and deliberately not listed.
pub(crate) const USER_DEFAULTS: &[FieldDefault] = &[
    FieldDefault::new("joinedAt", DefaultValue::ServerTimestamp),
    FieldDefault::new("friends", DefaultValue::EmptyArray),
    FieldDefault::new("isAdmin", DefaultValue::Bool(false)),
];

pub struct AddMissingUserFields;

#[async_trait]
impl Migration for AddMissingUserFields {
    fn name(&self) -> &'static str {
        "001_add_missing_user_fields"
    }

    fn description(&self) -> &'static str {
        "Add missing joinedAt, friends, and isAdmin fields to user documents"
    }

    async fn run(
        &self,
        db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        let mut stats = MigrationStats::new();
        let users = CollectionPath::root(USERS);

        let mut writer = DocumentWriter::direct(db, ctx);
        default_missing_fields(db, ctx, &users, USER_DEFAULTS, &mut writer, &mut stats).await?;

        Ok(stats)
    }
}

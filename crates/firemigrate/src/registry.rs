//! Migration registry.
//!
//! Migrations are registered at startup instead of being loaded from a
//! directory. Discovery is a pure function of the registered set: names
//! starting with [`RESERVED_PREFIX`] are skipped and the rest run in
//! lexicographic name order, so zero-padded numeric prefixes sort as
//! intended.

use crate::{DiscoveryError, Migration, migrations};

/// Names starting with this are never run (e.g. `_template`).
pub const RESERVED_PREFIX: char = '_';

/// Whether a migration with this name is eligible to run.
pub fn is_runnable_name(name: &str) -> bool {
    !name.starts_with(RESERVED_PREFIX)
}

/// Discovery ordering over bare names.
pub fn discover_names<'a, I>(names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<_> = names.into_iter().filter(|n| is_runnable_name(n)).collect();
    names.sort_unstable();
    names
}

/// The set of known migrations.
#[derive(Default)]
pub struct Registry {
    migrations: Vec<Box<dyn Migration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every shipped migration.
    pub fn builtin() -> Self {
        Self {
            migrations: migrations::all(),
        }
    }

    /// Add a migration. Names must be unique.
    pub fn register(
        &mut self,
        migration: Box<dyn Migration>,
    ) -> Result<&mut Self, DiscoveryError> {
        let name = migration.name();
        if self.migrations.iter().any(|m| m.name() == name) {
            return Err(DiscoveryError::Duplicate(name.to_string()));
        }
        self.migrations.push(migration);
        Ok(self)
    }

    /// Number of registered migrations, reserved ones included.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Runnable migrations in execution order.
    pub fn discover(&self) -> Result<Vec<&dyn Migration>, DiscoveryError> {
        let mut found: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| is_runnable_name(m.name()))
            .collect();

        if found.is_empty() {
            return Err(DiscoveryError::Empty);
        }

        found.sort_by_key(|m| m.name());
        Ok(found)
    }
}

//! Migration framework types.
//!
//! A migration is a single schema change expressed as imperative logic over
//! the [`DocumentStore`] interface. The runner hands every migration the same
//! store handle and an immutable [`MigrationContext`]; the migration reports
//! back what it did as [`MigrationStats`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use firemigrate_store::{DocumentStore, UpdateValue};

use crate::MigrationError;

// =============================================================================
// Execution Context
// =============================================================================

/// Per-run settings shared by every migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationContext {
    dry_run: bool,
}

impl MigrationContext {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Context that writes changes.
    pub fn apply() -> Self {
        Self::new(false)
    }

    /// Context that only reports what would change.
    pub fn dry_run() -> Self {
        Self::new(true)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Sentinel that removes a field when placed in an update.
    pub fn delete_field(&self) -> UpdateValue {
        UpdateValue::Delete
    }

    /// Sentinel that resolves to the store's commit time.
    pub fn server_timestamp(&self) -> UpdateValue {
        UpdateValue::ServerTimestamp
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// What a single migration did (or would do, in a dry run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Documents visited.
    pub scanned: u64,
    /// Documents that received (or would receive) a non-empty update.
    pub updated: u64,
    /// Documents whose update failed.
    pub errors: u64,
    /// Migration-specific counters.
    pub extra: BTreeMap<&'static str, u64>,
}

impl MigrationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to a named counter, creating it at zero if needed.
    pub fn add_extra(&mut self, name: &'static str, amount: u64) {
        *self.extra.entry(name).or_insert(0) += amount;
    }

    pub fn extra(&self, name: &str) -> u64 {
        self.extra.get(name).copied().unwrap_or(0)
    }

    /// Accumulate another record into this one.
    pub fn merge(&mut self, other: &MigrationStats) {
        self.scanned += other.scanned;
        self.updated += other.updated;
        self.errors += other.errors;
        for (name, amount) in &other.extra {
            self.add_extra(name, *amount);
        }
    }
}

// =============================================================================
// Migration Trait
// =============================================================================

/// A migration that can be applied to the database.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, sortable name (e.g. `001_add_missing_user_fields`).
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Run the migration.
    ///
    /// Per-document failures are counted in the returned stats. An `Err`
    /// means the migration could not continue at all.
    async fn run(
        &self,
        db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError>;
}

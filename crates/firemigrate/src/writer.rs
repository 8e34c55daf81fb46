//! Dry-run aware document writes with per-document failure accounting.

use std::mem;

use firemigrate_store::{DocumentPath, DocumentStore, UpdateMap, WriteBatch};
use tracing::{debug, info, warn};

use crate::{MigrationContext, MigrationStats};

#[derive(Clone, Copy)]
enum WriteMode {
    Direct,
    Batched { limit: usize },
}

/// Issues field updates on behalf of a migration.
///
/// In a dry run nothing is written but `updated` is counted exactly as it
/// would be on success. Failed writes are logged, counted under `errors`,
/// and never abort the caller. Batched writers must be closed with
/// [`DocumentWriter::finish`] to commit the remainder.
pub struct DocumentWriter<'a> {
    db: &'a dyn DocumentStore,
    ctx: MigrationContext,
    mode: WriteMode,
    pending: WriteBatch,
}

impl<'a> DocumentWriter<'a> {
    /// One round trip per document.
    pub fn direct(db: &'a dyn DocumentStore, ctx: &MigrationContext) -> Self {
        Self {
            db,
            ctx: *ctx,
            mode: WriteMode::Direct,
            pending: WriteBatch::new(),
        }
    }

    /// Group updates into commits of up to the store's batch limit.
    pub fn batched(db: &'a dyn DocumentStore, ctx: &MigrationContext) -> Self {
        let limit = db.max_batch_size();
        Self::with_batch_limit(db, ctx, limit)
    }

    /// Batched writer with a smaller limit (never above the store's).
    pub fn with_batch_limit(
        db: &'a dyn DocumentStore,
        ctx: &MigrationContext,
        limit: usize,
    ) -> Self {
        let limit = limit.clamp(1, db.max_batch_size().max(1));
        Self {
            db,
            ctx: *ctx,
            mode: WriteMode::Batched { limit },
            pending: WriteBatch::new(),
        }
    }

    /// Number of queued, uncommitted updates.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Update one document. Empty update maps are skipped.
    pub async fn update(
        &mut self,
        path: &DocumentPath,
        updates: UpdateMap,
        stats: &mut MigrationStats,
    ) {
        if updates.is_empty() {
            return;
        }

        if self.ctx.is_dry_run() {
            info!(document = %path, fields = ?updates.field_names(), "would update");
            stats.updated += 1;
            return;
        }

        match self.mode {
            WriteMode::Direct => match self.db.update_document(path, &updates).await {
                Ok(()) => {
                    debug!(document = %path, fields = ?updates.field_names(), "updated");
                    stats.updated += 1;
                }
                Err(e) => {
                    warn!(document = %path, error = %e, "error updating document");
                    stats.errors += 1;
                }
            },
            WriteMode::Batched { limit } => {
                self.pending.update(path.clone(), updates);
                if self.pending.len() >= limit {
                    self.flush(stats).await;
                }
            }
        }
    }

    /// Commit queued updates now.
    pub async fn flush(&mut self, stats: &mut MigrationStats) {
        if self.pending.is_empty() {
            return;
        }

        let batch = mem::take(&mut self.pending);
        let count = batch.len() as u64;
        let paths: Vec<String> = batch.writes().iter().map(|w| w.path().to_string()).collect();

        match self.db.commit(batch).await {
            Ok(()) => {
                debug!(count, "committed batch");
                stats.updated += count;
            }
            Err(e) => {
                warn!(count, error = %e, "batch commit failed");
                for path in &paths {
                    warn!(document = %path, "not updated (batch failed)");
                }
                stats.errors += count;
            }
        }
    }

    /// Commit anything still queued.
    pub async fn finish(mut self, stats: &mut MigrationStats) {
        self.flush(stats).await;
    }
}

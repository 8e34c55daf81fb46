//! Sequential migration runner.

use firemigrate_store::DocumentStore;
use tracing::{Instrument, error, info, info_span};

use crate::{Migration, MigrationContext, MigrationStats, Registry, RunError};

/// What to run and how.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Only run migrations whose name contains this token.
    pub selector: Option<String>,
}

/// Result of one completed migration.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub name: &'static str,
    pub stats: MigrationStats,
}

/// Result of a run in which every selected migration completed.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub dry_run: bool,
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    /// Counters summed across migrations.
    pub fn totals(&self) -> MigrationStats {
        let mut totals = MigrationStats::new();
        for outcome in &self.outcomes {
            totals.merge(&outcome.stats);
        }
        totals
    }
}

/// Progress hooks for presenting a run as it happens.
pub trait RunObserver {
    /// Called once with the migrations about to run, in order.
    fn on_plan(&mut self, _plan: &[&dyn Migration]) {}

    fn on_start(&mut self, _migration: &dyn Migration) {}

    fn on_complete(&mut self, _outcome: &UnitOutcome) {}
}

impl RunObserver for () {}

/// Runs registered migrations against a store, one at a time.
pub struct Runner<'a> {
    registry: &'a Registry,
    store: &'a dyn DocumentStore,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn DocumentStore) -> Self {
        Self { registry, store }
    }

    /// Migrations that would run for `selector`, in order.
    pub fn plan(&self, selector: Option<&str>) -> Result<Vec<&'a dyn Migration>, RunError> {
        let discovered = self.registry.discover()?;

        let Some(token) = selector else {
            return Ok(discovered);
        };

        let selected: Vec<_> = discovered
            .into_iter()
            .filter(|m| m.name().contains(token))
            .collect();

        if selected.is_empty() {
            return Err(RunError::NoMatch {
                selector: token.to_string(),
            });
        }
        Ok(selected)
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunReport, RunError> {
        self.run_with(options, &mut ()).await
    }

    /// Run the plan, reporting progress to `observer`.
    ///
    /// Stops at the first migration that returns an error; the ones that
    /// completed before it are carried in [`RunError::UnitFailed`].
    pub async fn run_with(
        &self,
        options: &RunOptions,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport, RunError> {
        let plan = self.plan(options.selector.as_deref())?;
        observer.on_plan(&plan);

        let ctx = MigrationContext::new(options.dry_run);
        let mut outcomes = Vec::with_capacity(plan.len());

        for migration in plan {
            let name = migration.name();
            observer.on_start(migration);

            let span = info_span!("migration", name);
            info!(parent: &span, dry_run = ctx.is_dry_run(), "starting");

            match migration.run(self.store, &ctx).instrument(span.clone()).await {
                Ok(stats) => {
                    info!(
                        parent: &span,
                        scanned = stats.scanned,
                        updated = stats.updated,
                        errors = stats.errors,
                        "finished"
                    );
                    let outcome = UnitOutcome { name, stats };
                    observer.on_complete(&outcome);
                    outcomes.push(outcome);
                }
                Err(source) => {
                    error!(parent: &span, error = %source, "migration failed");
                    return Err(RunError::UnitFailed {
                        name,
                        source,
                        completed: outcomes,
                    });
                }
            }
        }

        Ok(RunReport {
            dry_run: options.dry_run,
            outcomes,
        })
    }
}

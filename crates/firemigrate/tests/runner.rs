//! Runner orchestration: discovery, filtering, and abort semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use firemigrate::{
    DiscoveryError, Migration, MigrationContext, MigrationError, MigrationStats, Registry,
    RunError, RunObserver, RunOptions, Runner, UnitOutcome,
};
use firemigrate_store::{CollectionPath, DocumentStore, MemoryStore};

/// Counts its invocations and reports one scanned document per run.
struct Probe {
    name: &'static str,
    runs: Arc<AtomicUsize>,
}

impl Probe {
    fn new(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                runs: runs.clone(),
            },
            runs,
        )
    }
}

#[async_trait]
impl Migration for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "probe"
    }

    async fn run(
        &self,
        _db: &dyn DocumentStore,
        ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(MigrationStats {
            scanned: 1,
            updated: u64::from(!ctx.is_dry_run()),
            ..Default::default()
        })
    }
}

/// Fails the way a unit does when its top-level listing is unavailable.
struct Broken;

#[async_trait]
impl Migration for Broken {
    fn name(&self) -> &'static str {
        "002_broken"
    }

    fn description(&self) -> &'static str {
        "always fails"
    }

    async fn run(
        &self,
        db: &dyn DocumentStore,
        _ctx: &MigrationContext,
    ) -> Result<MigrationStats, MigrationError> {
        db.list_documents(&CollectionPath::root("users")).await?;
        Err(MigrationError::Failed("collection unavailable".into()))
    }
}

#[derive(Default)]
struct Recorder {
    planned: Vec<&'static str>,
    started: Vec<&'static str>,
    completed: Vec<UnitOutcome>,
}

impl RunObserver for Recorder {
    fn on_plan(&mut self, plan: &[&dyn Migration]) {
        self.planned = plan.iter().map(|m| m.name()).collect();
    }

    fn on_start(&mut self, migration: &dyn Migration) {
        self.started.push(migration.name());
    }

    fn on_complete(&mut self, outcome: &UnitOutcome) {
        self.completed.push(outcome.clone());
    }
}

fn options(dry_run: bool, selector: Option<&str>) -> RunOptions {
    RunOptions {
        dry_run,
        selector: selector.map(str::to_string),
    }
}

#[tokio::test]
async fn test_runs_in_name_order_skipping_reserved() {
    let store = MemoryStore::new();
    let mut registry = Registry::new();
    let (b, b_runs) = Probe::new("002_b");
    let (a, a_runs) = Probe::new("001_a");
    let (t, t_runs) = Probe::new("_scaffold");
    registry.register(Box::new(b)).unwrap();
    registry.register(Box::new(t)).unwrap();
    registry.register(Box::new(a)).unwrap();

    let mut recorder = Recorder::default();
    let report = Runner::new(&registry, &store)
        .run_with(&options(false, None), &mut recorder)
        .await
        .unwrap();

    assert_eq!(recorder.planned, vec!["001_a", "002_b"]);
    assert_eq!(recorder.started, vec!["001_a", "002_b"]);
    assert_eq!(recorder.completed.len(), 2);
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(t_runs.load(Ordering::SeqCst), 0);

    assert!(!report.dry_run);
    let totals = report.totals();
    assert_eq!(totals.scanned, 2);
    assert_eq!(totals.updated, 2);
}

#[tokio::test]
async fn test_selector_narrows_by_substring() {
    let store = MemoryStore::new();
    let registry = Registry::builtin();
    let runner = Runner::new(&registry, &store);

    let names: Vec<_> = runner
        .plan(Some("002"))
        .unwrap()
        .iter()
        .map(|m| m.name())
        .collect();
    assert_eq!(names, vec!["002_add_missing_calendar_event_fields"]);

    let names: Vec<_> = runner
        .plan(Some("missing"))
        .unwrap()
        .iter()
        .map(|m| m.name())
        .collect();
    assert_eq!(
        names,
        vec![
            "001_add_missing_user_fields",
            "002_add_missing_calendar_event_fields"
        ]
    );
}

#[tokio::test]
async fn test_selector_cannot_reach_reserved_names() {
    let store = MemoryStore::new();
    let registry = Registry::builtin();

    let err = Runner::new(&registry, &store)
        .plan(Some("template"))
        .err()
        .unwrap();
    assert!(matches!(err, RunError::NoMatch { selector } if selector == "template"));
}

#[tokio::test]
async fn test_no_match_runs_nothing() {
    let store = MemoryStore::new();
    let mut registry = Registry::new();
    let (a, runs) = Probe::new("001_a");
    registry.register(Box::new(a)).unwrap();

    let err = Runner::new(&registry, &store)
        .run(&options(false, Some("999")))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::NoMatch { .. }));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_registry_is_discovery_error() {
    let store = MemoryStore::new();
    let registry = Registry::new();

    let err = Runner::new(&registry, &store)
        .run(&options(true, None))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Discovery(DiscoveryError::Empty)));
    assert_eq!(err.to_string(), "no migrations found");
}

#[tokio::test]
async fn test_failing_unit_aborts_run() {
    let store = MemoryStore::new();
    let mut registry = Registry::new();
    let (first, first_runs) = Probe::new("001_first");
    let (last, last_runs) = Probe::new("003_last");
    registry.register(Box::new(last)).unwrap();
    registry.register(Box::new(Broken)).unwrap();
    registry.register(Box::new(first)).unwrap();

    let mut recorder = Recorder::default();
    let err = Runner::new(&registry, &store)
        .run_with(&options(false, None), &mut recorder)
        .await
        .unwrap_err();

    match err {
        RunError::UnitFailed {
            name,
            source,
            completed,
        } => {
            assert_eq!(name, "002_broken");
            assert_eq!(source.to_string(), "collection unavailable");
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].name, "001_first");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(first_runs.load(Ordering::SeqCst), 1);
    assert_eq!(last_runs.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.started, vec!["001_first", "002_broken"]);
}

#[tokio::test]
async fn test_dry_run_context_reaches_units() {
    let store = MemoryStore::new();
    let mut registry = Registry::new();
    let (a, _) = Probe::new("001_a");
    registry.register(Box::new(a)).unwrap();

    let report = Runner::new(&registry, &store)
        .run(&options(true, None))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.outcomes[0].stats.updated, 0);
}

#[tokio::test]
async fn test_builtin_dry_run_over_empty_store() {
    let store = MemoryStore::new();
    let registry = Registry::builtin();

    let report = Runner::new(&registry, &store)
        .run(&options(true, None))
        .await
        .unwrap();

    let names: Vec<_> = report.outcomes.iter().map(|o| o.name).collect();
    assert_eq!(
        names,
        vec![
            "001_add_missing_user_fields",
            "002_add_missing_calendar_event_fields",
            "003_migrate_embedded_events_to_subcollection",
        ]
    );
    assert_eq!(report.totals().scanned, 0);
    assert_eq!(store.commit_calls().await, 0);
}

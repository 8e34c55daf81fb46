//! firemigrate: run Firestore schema migrations
//!
//! Runs every registered migration in name order, or only those matching
//! `--migration`. `--dry-run` reports what would change without writing.

use std::path::PathBuf;

use clap::Parser;
use firemigrate::{
    ConnectError, ConnectionOptions, Migration, Registry, RunError, RunObserver, RunOptions,
    Runner, UnitOutcome, connect,
};
use firemigrate_store::firestore::DEFAULT_DATABASE;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RULE: &str = "========================================";

#[derive(Parser)]
#[command(name = "firemigrate")]
#[command(about = "Run Firestore schema migrations", long_about = None)]
struct Cli {
    /// Preview changes without applying them
    #[arg(long)]
    dry_run: bool,

    /// Only run migrations whose name contains this token (e.g. 001)
    #[arg(long)]
    migration: Option<String>,

    /// List migrations and exit
    #[arg(long)]
    list: bool,

    /// Project ID (falls back to FIREBASE_PROJECT_ID, then the key file)
    #[arg(long, env = "GCLOUD_PROJECT")]
    project: Option<String>,

    /// Service account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    key: Option<PathBuf>,

    /// Database ID
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Firestore emulator host (e.g. localhost:8080)
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// Pre-minted OAuth2 access token
    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

impl Cli {
    fn connection_options(&self) -> ConnectionOptions {
        let project = self
            .project
            .clone()
            .or_else(|| std::env::var("FIREBASE_PROJECT_ID").ok())
            .filter(|p| !p.is_empty());

        ConnectionOptions {
            project,
            key_file: self.key.clone(),
            database: Some(self.database.clone()),
            emulator_host: self.emulator_host.clone().filter(|h| !h.is_empty()),
            access_token: self.access_token.clone().filter(|t| !t.is_empty()),
            adc_file: None,
        }
    }
}

/// Prints progress the way operators read it.
struct Console;

impl RunObserver for Console {
    fn on_plan(&mut self, plan: &[&dyn Migration]) {
        println!("\nFound {} migration(s):\n", plan.len());
    }

    fn on_start(&mut self, migration: &dyn Migration) {
        println!("Running: {}", migration.name());
        println!("  {}", migration.description());
    }

    fn on_complete(&mut self, outcome: &UnitOutcome) {
        let stats = &outcome.stats;
        println!("  Documents scanned: {}", stats.scanned);
        println!("  Documents updated: {}", stats.updated);
        for (name, value) in &stats.extra {
            println!("  {}: {}", name, value);
        }
        if stats.errors > 0 {
            println!("  Errors: {}", stats.errors);
        }
        println!();
    }
}

fn print_list(registry: &Registry) -> Result<()> {
    let migrations = registry.discover().map_err(|e| miette::miette!("{}", e))?;

    println!("Available migrations:\n");
    for m in migrations {
        println!("  {}", m.name());
        println!("      {}\n", m.description());
    }
    Ok(())
}

fn print_connect_help(err: &ConnectError) {
    match err {
        ConnectError::MissingProject => {
            println!("No project ID specified!");
            println!("\nProvide a project ID using one of these methods:");
            println!("  firemigrate --project=my-project");
            println!("  firemigrate --key=service-account.json");
            println!("  FIREBASE_PROJECT_ID=my-project firemigrate");
        }
        _ => {
            println!("Failed to initialize Firestore: {}", err);
            println!("\nAuthentication options:");
            println!("  1. Use a service account key:");
            println!("     firemigrate --key=service-account.json");
            println!("  2. Use gcloud ADC:");
            println!("     gcloud auth application-default login");
            println!("     firemigrate --project=my-project");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "firemigrate=info,firemigrate_store=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let registry = Registry::builtin();

    if cli.list {
        return print_list(&registry);
    }

    println!("\n{}", RULE);
    println!("  Firestore Migration Runner");
    println!("{}\n", RULE);

    if cli.dry_run {
        println!("DRY RUN MODE - No changes will be made\n");
    }

    let conn = connect(&cli.connection_options()).map_err(|e| {
        print_connect_help(&e);
        miette::miette!("{}", e)
    })?;
    println!("Using {}", conn.source);
    println!("Project: {}", conn.project_id());

    let options = RunOptions {
        dry_run: cli.dry_run,
        selector: cli.migration.clone(),
    };
    let runner = Runner::new(&registry, &conn.client);

    let report = match runner.run_with(&options, &mut Console).await {
        Ok(report) => report,
        Err(RunError::UnitFailed {
            name,
            source,
            completed,
        }) => {
            println!("  Error: {}", source);
            return Err(miette::miette!(
                "migration {} failed ({} completed before it; later migrations not run)",
                name,
                completed.len()
            ));
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    let totals = report.totals();
    println!(
        "Total: {} scanned, {} updated, {} error(s)",
        totals.scanned, totals.updated, totals.errors
    );

    println!("{}", RULE);
    if report.dry_run {
        println!("  Dry run complete!");
    } else {
        println!("  All migrations complete!");
    }
    println!("{}\n", RULE);

    Ok(())
}

//! Error types for the migration runner.

use firemigrate_store::StoreError;
use thiserror::Error;

use crate::UnitOutcome;

/// A migration could not continue.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Store operation outside any per-document guard failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Migration-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Errors while discovering migrations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Nothing eligible to run.
    #[error("no migrations found")]
    Empty,

    /// Two migrations registered under the same name.
    #[error("duplicate migration name: {0}")]
    Duplicate(String),
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The `--migration` selector matched nothing.
    #[error("no migration found matching: {selector}")]
    NoMatch { selector: String },

    /// A migration returned an error; later migrations were not run.
    #[error("migration {name} failed: {source}")]
    UnitFailed {
        name: &'static str,
        source: MigrationError,
        /// Migrations that finished before the failure.
        completed: Vec<UnitOutcome>,
    },
}

/// Errors while resolving project and credentials.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No project ID from flags, environment, or key file.
    #[error("no project ID specified")]
    MissingProject,

    /// No usable credential source.
    #[error("no credentials found (tried key file, access token, and application default credentials)")]
    NoCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

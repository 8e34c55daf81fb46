//! Firestore schema migrations.
//!
//! Migrations are imperative scripts over the [`DocumentStore`] interface,
//! registered at startup and run strictly in name order:
//! - [`Registry`]: the known migrations and discovery order
//! - [`Runner`]: filtering, sequential execution, and reporting
//! - [`DocumentWriter`]: dry-run aware updates with failure accounting
//! - [`migrations`]: the shipped migrations
//!
//! [`DocumentStore`]: firemigrate_store::DocumentStore

pub mod connect;
pub mod defaults;
mod error;
mod migrate;
pub mod migrations;
mod registry;
mod runner;
mod writer;

pub use connect::{Connection, ConnectionOptions, CredentialSource, connect};
pub use error::{ConnectError, DiscoveryError, MigrationError, RunError};
pub use migrate::{Migration, MigrationContext, MigrationStats};
pub use registry::{RESERVED_PREFIX, Registry, discover_names, is_runnable_name};
pub use runner::{RunObserver, RunOptions, RunReport, Runner, UnitOutcome};
pub use writer::DocumentWriter;

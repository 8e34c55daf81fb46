//! Document store capability interface for firemigrate.
//!
//! Migrations only ever see the narrow [`DocumentStore`] trait defined here:
//! list a collection, fetch a document, and commit field-level writes. Two
//! adapters are provided:
//!
//! - **Firestore**: REST client with service account, user, token, and
//!   emulator credentials
//! - **Memory**: in-process store with Firestore-like commit semantics, used
//!   to rehearse and test migrations

mod document;
mod error;
pub mod firestore;
pub mod memory;
mod path;
mod store;
mod update;
mod value;

pub use document::Document;
pub use error::StoreError;
pub use firestore::{Credentials, FirestoreClient};
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocumentPath};
pub use store::{DocumentStore, MAX_BATCH_WRITES, Write, WriteBatch};
pub use update::{UpdateMap, UpdateValue};
pub use value::{Field, Value};

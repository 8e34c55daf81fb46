//! The database capability interface consumed by migrations.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{CollectionPath, Document, DocumentPath, StoreError, UpdateMap, Value};

/// Maximum number of writes in a single batch commit.
pub const MAX_BATCH_WRITES: usize = 500;

/// A single write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Field-level update of an existing document.
    Update {
        path: DocumentPath,
        updates: UpdateMap,
    },
    /// Create or replace a document.
    Set {
        path: DocumentPath,
        fields: BTreeMap<String, Value>,
    },
    /// Remove a document.
    Delete { path: DocumentPath },
}

impl Write {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Write::Update { path, .. } | Write::Set { path, .. } | Write::Delete { path } => path,
        }
    }
}

/// A group of writes committed atomically in one round trip.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, path: DocumentPath, updates: UpdateMap) -> &mut Self {
        self.writes.push(Write::Update { path, updates });
        self
    }

    pub fn set(&mut self, path: DocumentPath, fields: BTreeMap<String, Value>) -> &mut Self {
        self.writes.push(Write::Set { path, fields });
        self
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.writes.push(Write::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

impl From<Write> for WriteBatch {
    fn from(write: Write) -> Self {
        Self {
            writes: vec![write],
        }
    }
}

/// Hierarchical document store.
///
/// Adapters implement listing, lookup, and atomic batch commit; the
/// single-document writes default to one-element batches.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Snapshot every document directly inside `collection`.
    async fn list_documents(&self, collection: &CollectionPath)
    -> Result<Vec<Document>, StoreError>;

    /// Fetch one document, `None` if it does not exist.
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Commit all writes atomically. Fails without applying anything if any write is rejected.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Upper bound on writes per commit.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_WRITES
    }

    /// Apply field updates to an existing document.
    async fn update_document(
        &self,
        path: &DocumentPath,
        updates: &UpdateMap,
    ) -> Result<(), StoreError> {
        self.commit(
            Write::Update {
                path: path.clone(),
                updates: updates.clone(),
            }
            .into(),
        )
        .await
    }

    /// Create or fully replace a document.
    async fn set_document(
        &self,
        path: &DocumentPath,
        fields: &BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        self.commit(
            Write::Set {
                path: path.clone(),
                fields: fields.clone(),
            }
            .into(),
        )
        .await
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.commit(Write::Delete { path: path.clone() }.into())
            .await
    }
}

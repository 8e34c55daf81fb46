//! In-memory document store.
//!
//! Mirrors the commit semantics of the real store closely enough to rehearse
//! migrations: updates require an existing document, batches apply atomically,
//! and individual documents can be configured to reject writes.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::trace;

use crate::{
    CollectionPath, Document, DocumentPath, DocumentStore, StoreError, UpdateValue, Value, Write,
    WriteBatch,
};

type Fields = BTreeMap<String, Value>;

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<DocumentPath, Fields>,
    rejected: HashMap<DocumentPath, String>,
    commit_calls: usize,
    writes_applied: usize,
}

/// Thread-safe in-memory implementation of [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    max_batch_size: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a smaller per-commit limit than the production one.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// Seed a document directly, bypassing commit bookkeeping.
    pub async fn insert(&self, path: DocumentPath, fields: Fields) {
        self.state.write().await.documents.insert(path, fields);
    }

    /// Make every future write touching `path` fail with `reason`.
    pub async fn reject_writes_to(&self, path: DocumentPath, reason: impl Into<String>) {
        self.state
            .write()
            .await
            .rejected
            .insert(path, reason.into());
    }

    pub async fn clear_rejections(&self) {
        self.state.write().await.rejected.clear();
    }

    /// Current fields of a document.
    pub async fn fields(&self, path: &DocumentPath) -> Option<Fields> {
        self.state.read().await.documents.get(path).cloned()
    }

    /// Number of stored documents across all collections.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of commit attempts, successful or not.
    pub async fn commit_calls(&self) -> usize {
        self.state.read().await.commit_calls
    }

    /// Number of individual writes that have been applied.
    pub async fn writes_applied(&self) -> usize {
        self.state.read().await.writes_applied
    }
}

/// Pending contents of every path a batch touches. `None` is a deletion.
type Staged = BTreeMap<DocumentPath, Option<Fields>>;

fn apply_write(
    documents: &BTreeMap<DocumentPath, Fields>,
    staged: &mut Staged,
    write: Write,
    now: &Value,
) -> Result<(), StoreError> {
    match write {
        Write::Update { path, updates } => {
            let slot = staged
                .entry(path.clone())
                .or_insert_with_key(|p| documents.get(p).cloned());
            let fields = slot.as_mut().ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })?;
            for (name, value) in updates.iter() {
                match value {
                    UpdateValue::Set(v) => {
                        fields.insert(name.to_string(), v.clone());
                    }
                    UpdateValue::Delete => {
                        fields.remove(name);
                    }
                    UpdateValue::ServerTimestamp => {
                        fields.insert(name.to_string(), now.clone());
                    }
                }
            }
        }
        Write::Set { path, fields } => {
            staged.insert(path, Some(fields));
        }
        Write::Delete { path } => {
            staged.insert(path, None);
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .filter(|(path, _)| path.parent() == *collection)
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect())
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(path)
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let max = self.max_batch_size();
        let mut state = self.state.write().await;
        state.commit_calls += 1;

        if batch.len() > max {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                max,
            });
        }

        for write in batch.writes() {
            if let Some(reason) = state.rejected.get(write.path()) {
                return Err(StoreError::Rejected {
                    path: write.path().to_string(),
                    reason: reason.clone(),
                });
            }
        }

        // Nothing reaches the documents until every write has staged.
        let now = Value::Timestamp(Utc::now());
        let mut staged = Staged::new();
        let count = batch.len();
        for write in batch.into_writes() {
            apply_write(&state.documents, &mut staged, write, &now)?;
        }

        for (path, fields) in staged {
            match fields {
                Some(fields) => state.documents.insert(path, fields),
                None => state.documents.remove(&path),
            };
        }
        state.writes_applied += count;
        trace!(writes = count, "committed batch to memory store");
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size.unwrap_or(crate::MAX_BATCH_WRITES)
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    DocumentId, DocumentStoreError, Filter, Result, Update,
    store::DocumentStore,
};

#[derive(Default)]
struct InMemoryState {
    /// Per collection, documents in insertion order.
    collections: HashMap<String, Vec<(DocumentId, Value)>>,
    /// Collections whose writes are rejected, for exercising failure paths.
    failing_collections: HashSet<String>,
}

impl InMemoryState {
    fn check_writable(&self, collection: &str) -> Result<()> {
        if self.failing_collections.contains(collection) {
            return Err(DocumentStoreError::Unavailable(format!(
                "writes to '{collection}' are failing"
            )));
        }
        Ok(())
    }
}

/// In-memory document store implementation.
///
/// Stores all documents behind a single lock and provides the same
/// interface and atomicity as the PostgreSQL implementation. Clones share
/// the same underlying data.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Makes every subsequent write to `collection` fail (or succeed again).
    pub async fn set_fail_writes(&self, collection: &str, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failing_collections.insert(collection.to_string());
        } else {
            state.failing_collections.remove(collection);
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, id: DocumentId, doc: Value) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable(collection)?;

        let documents = state.collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|(existing, _)| *existing == id) {
            return Err(DocumentStoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }
        documents.push((id, doc));
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Value>> {
        let state = self.state.read().await;
        Ok(state.collections.get(collection).and_then(|documents| {
            documents
                .iter()
                .find(|(existing, _)| *existing == id)
                .map(|(_, doc)| doc.clone())
        }))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        id: DocumentId,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Value>> {
        let mut state = self.state.write().await;
        state.check_writable(collection)?;

        let Some(doc) = state.collections.get_mut(collection).and_then(|documents| {
            documents
                .iter_mut()
                .find(|(existing, _)| *existing == id)
                .map(|(_, doc)| doc)
        }) else {
            return Ok(None);
        };

        if !filter.matches(doc) {
            tracing::debug!(collection, id = %id, "conditional update did not match");
            return Ok(None);
        }

        update.apply(doc)?;
        Ok(Some(doc.clone()))
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_writable(collection)?;

        let Some(documents) = state.collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = documents.len();
        documents.retain(|(existing, _)| *existing != id);
        Ok(documents.len() != before)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_writable(collection)?;

        let Some(documents) = state.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|(_, doc)| !filter.matches(doc));
        let deleted = (before - documents.len()) as u64;
        tracing::debug!(collection, deleted, "documents deleted");
        Ok(deleted)
    }
}

use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, DocumentId, DocumentStoreError, Filter, Result, Update};

/// Core trait for document store implementations.
///
/// A document store keeps JSON documents in named collections, keyed by
/// [`DocumentId`]. All implementations must be thread-safe (Send + Sync);
/// callers never need extra locking around a single operation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document.
    ///
    /// Fails with `DuplicateKey` if the collection already holds `id`.
    async fn insert(&self, collection: &str, id: DocumentId, doc: Value) -> Result<()>;

    /// Retrieves a document by its key.
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Value>>;

    /// Retrieves every document matching `filter`, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Atomically applies `update` to the document `id` if it matches `filter`.
    ///
    /// The match and the write happen as one step, so concurrent callers
    /// conditioning on the same field value cannot both succeed.
    /// Returns the updated document, or None if it is missing or did not match.
    async fn update_one(
        &self,
        collection: &str,
        id: DocumentId,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Value>>;

    /// Deletes a document by its key. Returns true if it existed.
    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool>;

    /// Deletes every document matching `filter`. Returns the number removed.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;
}

/// Extension trait providing typed access for any [`Document`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Serializes and inserts a document into its collection.
    async fn insert_document<T: Document>(&self, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.insert(T::COLLECTION, doc.id(), value).await
    }

    /// Loads a document by key.
    async fn get_document<T: Document>(&self, id: DocumentId) -> Result<Option<T>> {
        match self.find_by_id(T::COLLECTION, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Loads every document of type `T` matching `filter`.
    async fn find_documents<T: Document>(&self, filter: &Filter) -> Result<Vec<T>> {
        self.find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(DocumentStoreError::from))
            .collect()
    }

    /// Conditionally updates a document and returns its new state.
    async fn update_document<T: Document>(
        &self,
        id: DocumentId,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<T>> {
        match self.update_one(T::COLLECTION, id, filter, update).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Deletes a document of type `T` by key.
    async fn delete_document<T: Document>(&self, id: DocumentId) -> Result<bool> {
        self.delete_by_id(T::COLLECTION, id).await
    }

    /// Deletes every document of type `T` matching `filter`.
    async fn delete_documents<T: Document>(&self, filter: &Filter) -> Result<u64> {
        self.delete_many(T::COLLECTION, filter).await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

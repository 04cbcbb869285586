//! Durable Store - the persistent, collection-oriented local database.
//!
//! Wraps a [`StorageBackend`] with the schema it was opened for and an
//! explicit per-collection lock, so read-modify-write sequences on one
//! collection never interleave even on a multi-threaded runtime.

use crate::error::StorageResult;
use crate::storage::StorageBackend;
use dashmap::DashMap;
use harbor_engine::{extract_id, CollectionName, Schema};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The authoritative local copy of every record.
pub struct DurableStore {
    backend: Arc<dyn StorageBackend>,
    schema: Schema,
    locks: DashMap<CollectionName, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl DurableStore {
    /// Open the backend for `schema`, applying any pending upgrade.
    pub async fn open(backend: Arc<dyn StorageBackend>, schema: Schema) -> StorageResult<Self> {
        let upgrade = backend.open(&schema).await?;
        tracing::info!(
            schema_version = schema.version,
            collections = upgrade.manifest.collections.len(),
            "Durable store opened"
        );

        Ok(Self {
            backend,
            schema,
            locks: DashMap::new(),
        })
    }

    /// The schema the store was opened with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Take exclusive access to one collection.
    ///
    /// Other writers (and locked readers) of the same collection wait until
    /// the returned writer is dropped. Collections are independent.
    /// Undeclared names get a throwaway lock: they read as empty and every
    /// write to them fails, so there is nothing to exclude.
    pub async fn write(&self, collection: &str) -> CollectionWriter<'_> {
        let lock = if self.schema.contains(collection) {
            self.locks
                .entry(collection.to_string())
                .or_default()
                .clone()
        } else {
            Arc::default()
        };
        CollectionWriter {
            store: self,
            collection: collection.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Every record in the collection; empty if it holds nothing.
    pub async fn get_all(&self, collection: &str) -> StorageResult<Vec<Value>> {
        self.write(collection).await.get_all().await
    }

    pub async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
        self.write(collection).await.get(id).await
    }

    /// Upsert by id.
    pub async fn put(&self, collection: &str, record: Value) -> StorageResult<()> {
        self.write(collection).await.put(record).await
    }

    /// Remove by id; absent ids are a no-op.
    pub async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        self.write(collection).await.delete(id).await
    }

    pub async fn clear(&self, collection: &str) -> StorageResult<()> {
        self.write(collection).await.clear().await
    }

    /// Clear and repopulate in one locked step.
    pub async fn replace_all(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        self.write(collection).await.replace_all(records).await
    }
}

/// Locked access to one collection, see [`DurableStore::write`].
pub struct CollectionWriter<'a> {
    store: &'a DurableStore,
    collection: CollectionName,
    _guard: OwnedMutexGuard<()>,
}

impl CollectionWriter<'_> {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn get_all(&self) -> StorageResult<Vec<Value>> {
        self.store.backend.get_all(&self.collection).await
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<Value>> {
        self.store.backend.get(&self.collection, id).await
    }

    pub async fn put(&self, record: Value) -> StorageResult<()> {
        let id = extract_id(&record)?;
        self.store.backend.put(&self.collection, record).await?;
        tracing::debug!(collection = %self.collection, record_id = %id, "Record stored");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.store.backend.delete(&self.collection, id).await?;
        tracing::debug!(collection = %self.collection, record_id = %id, "Record deleted");
        Ok(())
    }

    pub async fn clear(&self) -> StorageResult<()> {
        self.store.backend.clear(&self.collection).await?;
        tracing::debug!(collection = %self.collection, "Collection cleared");
        Ok(())
    }

    pub async fn replace_all(&self, records: Vec<Value>) -> StorageResult<()> {
        // Reject bad input before anything is cleared.
        for record in &records {
            extract_id(record)?;
        }
        let count = records.len();
        self.store.backend.replace(&self.collection, records).await?;
        tracing::debug!(collection = %self.collection, records = count, "Collection replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryBackend;
    use harbor_engine::Error;
    use serde_json::json;
    use std::time::Duration;

    async fn open_store() -> DurableStore {
        let schema = Schema::new(1)
            .with_collection("customers")
            .with_collection("products");
        DurableStore::open(Arc::new(MemoryBackend::new()), schema)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn get_all_missing_collection_is_empty() {
        let store = open_store().await;
        assert!(store.get_all("nothing-here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_upserts_by_id() {
        let store = open_store().await;
        store
            .put("customers", json!({"id": "c1", "name": "Acme"}))
            .await
            .unwrap();
        store
            .put("customers", json!({"id": "c1", "name": "Acme Srl"}))
            .await
            .unwrap();

        let all = store.get_all("customers").await.unwrap();
        assert_eq!(all, vec![json!({"id": "c1", "name": "Acme Srl"})]);
    }

    #[tokio::test]
    async fn put_without_id_fails() {
        let store = open_store().await;
        let result = store.put("customers", json!({"name": "Acme"})).await;
        assert!(matches!(
            result,
            Err(StorageError::Engine(Error::MissingRecordId))
        ));
    }

    #[tokio::test]
    async fn delete_absent_is_noop() {
        let store = open_store().await;
        store.delete("customers", "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn replace_all_rejects_bad_input_without_clearing() {
        let store = open_store().await;
        store.put("customers", json!({"id": "c1"})).await.unwrap();

        let result = store
            .replace_all("customers", vec![json!({"id": "c2"}), json!({"no": "id"})])
            .await;
        assert!(result.is_err());
        assert_eq!(
            store.get_all("customers").await.unwrap(),
            vec![json!({"id": "c1"})]
        );
    }

    #[tokio::test]
    async fn writer_excludes_same_collection_only() {
        let store = Arc::new(open_store().await);
        let writer = store.write("customers").await;

        // A different collection is not blocked.
        tokio::time::timeout(Duration::from_millis(200), store.put("products", json!({"id": "p1"})))
            .await
            .expect("other collection blocked")
            .unwrap();

        // The same collection waits for the writer.
        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.put("customers", json!({"id": "c1"})).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(writer);
        pending.await.unwrap().unwrap();
        assert_eq!(store.get_all("customers").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undeclared_names_do_not_grow_lock_table() {
        let store = open_store().await;
        store.get_all("customers").await.unwrap();

        for i in 0..10 {
            let name = format!("unknown-{}", i);
            assert!(store.get_all(&name).await.unwrap().is_empty());
            assert!(store.get(&name, "x").await.unwrap().is_none());
        }

        assert_eq!(store.locks.len(), 1);
        assert!(store.locks.contains_key("customers"));
    }
}

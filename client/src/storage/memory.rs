//! In-process storage backend.

use super::StorageBackend;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use harbor_engine::{Collection, Error, Manifest, Schema, Upgrade};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    manifest: Option<Manifest>,
    collections: HashMap<String, Collection>,
}

impl MemoryState {
    fn declared(&self, collection: &str) -> StorageResult<()> {
        let manifest = self.manifest.as_ref().ok_or(StorageError::NotOpen)?;
        if manifest.collections.contains(collection) {
            Ok(())
        } else {
            Err(Error::CollectionNotFound(collection.to_string()).into())
        }
    }

    fn record_count(&self) -> usize {
        self.collections.values().map(Collection::len).sum()
    }
}

/// A backend that keeps everything in memory.
///
/// Clones share the same data, so dropping every store built on a backend and
/// opening a new one over a clone behaves like a process restart. An optional
/// record capacity emulates a device storage quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    capacity: Option<usize>,
}

impl MemoryBackend {
    /// Create an empty, unbounded backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that holds at most `capacity` records in total.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::default(),
            capacity: Some(capacity),
        }
    }

    fn check_quota(&self, state: &MemoryState, additional: usize) -> StorageResult<()> {
        match self.capacity {
            Some(capacity) if state.record_count() + additional > capacity => {
                Err(StorageError::QuotaExceeded { capacity })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn open(&self, schema: &Schema) -> StorageResult<Upgrade> {
        let mut state = self.state.write().await;
        let upgrade = schema.plan_upgrade(state.manifest.as_ref())?;

        for name in &upgrade.created {
            state.collections.entry(name.clone()).or_default();
        }
        state.manifest = Some(upgrade.manifest.clone());

        Ok(upgrade)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Value>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, record: Value) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.declared(collection)?;

        let id = harbor_engine::extract_id(&record)?;
        let is_new = !state
            .collections
            .get(collection)
            .is_some_and(|c| c.contains(&id));
        if is_new {
            self.check_quota(&state, 1)?;
        }

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .upsert(record)?;
        Ok(())
    }

    async fn put_many(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.declared(collection)?;

        let mut staged = state.collections.get(collection).cloned().unwrap_or_default();
        let before = staged.len();
        for record in records {
            staged.upsert(record)?;
        }
        self.check_quota(&state, staged.len() - before)?;

        state.collections.insert(collection.to_string(), staged);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.declared(collection)?;
        if let Some(c) = state.collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.declared(collection)?;
        if let Some(c) = state.collections.get_mut(collection) {
            c.clear();
        }
        Ok(())
    }

    async fn replace(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.declared(collection)?;

        let mut staged = Collection::new();
        for record in records {
            staged.upsert(record)?;
        }
        let current = state.collections.get(collection).map_or(0, Collection::len);
        if staged.len() > current {
            self.check_quota(&state, staged.len() - current)?;
        }

        state.collections.insert(collection.to_string(), staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(1).with_collection("customers")
    }

    #[tokio::test]
    async fn put_get_delete() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();

        backend
            .put("customers", json!({"id": "c1", "name": "Acme"}))
            .await
            .unwrap();
        assert_eq!(
            backend.get("customers", "c1").await.unwrap(),
            Some(json!({"id": "c1", "name": "Acme"}))
        );

        backend.delete("customers", "c1").await.unwrap();
        backend.delete("customers", "c1").await.unwrap();
        assert!(backend.get_all("customers").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_of_unknown_collection_are_empty() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();
        assert!(backend.get_all("orders").await.unwrap().is_empty());
        assert!(backend.get("orders", "o1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_to_undeclared_collection_fail() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();

        let result = backend.put("orders", json!({"id": "o1"})).await;
        assert!(matches!(
            result,
            Err(StorageError::Engine(Error::CollectionNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn writes_before_open_fail() {
        let backend = MemoryBackend::new();
        let result = backend.put("customers", json!({"id": "c1"})).await;
        assert!(matches!(result, Err(StorageError::NotOpen)));
    }

    #[tokio::test]
    async fn quota_counts_new_records_only() {
        let backend = MemoryBackend::with_capacity(1);
        backend.open(&schema()).await.unwrap();

        backend.put("customers", json!({"id": "c1"})).await.unwrap();
        backend
            .put("customers", json!({"id": "c1", "name": "again"}))
            .await
            .unwrap();

        let result = backend.put("customers", json!({"id": "c2"})).await;
        assert!(matches!(
            result,
            Err(StorageError::QuotaExceeded { capacity: 1 })
        ));
    }

    #[tokio::test]
    async fn replace_swaps_contents() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();
        backend.put("customers", json!({"id": "old"})).await.unwrap();

        backend
            .replace("customers", vec![json!({"id": "a"}), json!({"id": "b"})])
            .await
            .unwrap();

        let all = backend.get_all("customers").await.unwrap();
        assert_eq!(all, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[tokio::test]
    async fn reopen_with_newer_schema_keeps_data() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();
        backend.put("customers", json!({"id": "c1"})).await.unwrap();

        let upgraded = Schema::new(2)
            .with_collection("customers")
            .with_collection("products");
        let upgrade = backend.clone().open(&upgraded).await.unwrap();

        assert_eq!(upgrade.from, Some(1));
        assert!(upgrade.created.contains("products"));
        assert_eq!(backend.get_all("customers").await.unwrap().len(), 1);
        backend.put("products", json!({"id": "p1"})).await.unwrap();
    }
}

//! Device-local storage engines.
//!
//! The Durable Store talks to storage only through [`StorageBackend`], so the
//! sync logic is the same whether records live in process memory (tests) or
//! in files on the device.

mod file;
mod memory;

pub use file::*;
pub use memory::*;

use crate::error::StorageResult;
use async_trait::async_trait;
use harbor_engine::{Schema, Upgrade};
use serde_json::Value;

/// Capability interface over a named, versioned, collection-oriented store.
///
/// Contract:
/// - `open` must be called first; it applies the schema upgrade and never
///   drops data in collections that already exist.
/// - Reads of a collection with no data return empty, never an error.
/// - Writes to a collection the store does not hold fail with
///   `CollectionNotFound`.
/// - `get_all` returns records ordered by id.
/// - Failures are reported, not retried.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open (or create) the store for `schema`.
    async fn open(&self, schema: &Schema) -> StorageResult<Upgrade>;

    /// Get one record by id.
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>>;

    /// Every record in the collection, ordered by id.
    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Value>>;

    /// Upsert by id.
    async fn put(&self, collection: &str, record: Value) -> StorageResult<()>;

    /// Upsert several records.
    async fn put_many(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        for record in records {
            self.put(collection, record).await?;
        }
        Ok(())
    }

    /// Remove by id; absent ids are not an error.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;

    /// Remove every record in the collection.
    async fn clear(&self, collection: &str) -> StorageResult<()>;

    /// Replace the collection's contents with `records`.
    ///
    /// Backends that can do this in one write should override it.
    async fn replace(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        self.clear(collection).await?;
        self.put_many(collection, records).await
    }
}

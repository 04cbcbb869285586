//! File-backed storage engine.
//!
//! Layout under the data directory:
//!
//! ```text
//! manifest.json                    schema version and collection list
//! collections/<collection>.json    one CollectionSnapshot per collection
//! ```
//!
//! Every write goes to a temporary file that is then renamed over the target,
//! so a crash mid-write leaves either the old or the new contents, never a
//! torn file.

use super::StorageBackend;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use harbor_engine::{Collection, CollectionSnapshot, Error, Manifest, Schema, Upgrade};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const MANIFEST_FILE: &str = "manifest.json";
/// Kept apart from the manifest so no collection name can shadow it.
const COLLECTIONS_DIR: &str = "collections";

/// A backend that persists each collection as a JSON file.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    /// Manifest after `open`; also serializes read-modify-write cycles
    manifest: Mutex<Option<Manifest>>,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. Nothing is touched until `open`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            manifest: Mutex::new(None),
        }
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir
            .join(COLLECTIONS_DIR)
            .join(format!("{}.json", collection))
    }

    async fn read_manifest(&self) -> StorageResult<Option<Manifest>> {
        match tokio::fs::read_to_string(self.dir.join(MANIFEST_FILE)).await {
            Ok(json) => Ok(Some(Manifest::from_json(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_collection(&self, collection: &str) -> StorageResult<Collection> {
        // Names come from the schema, but reads accept anything; never build a
        // path from a name that could escape the directory.
        if harbor_engine::schema::validate_collection_name(collection).is_err() {
            return Ok(Collection::new());
        }

        match tokio::fs::read_to_string(self.collection_path(collection)).await {
            Ok(json) => Ok(CollectionSnapshot::from_json(&json, collection)?.into_collection()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Collection::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_collection(&self, name: &str, collection: &Collection) -> StorageResult<()> {
        let json = CollectionSnapshot::capture(name, collection).to_json()?;
        write_atomic(&self.collection_path(name), json.as_bytes()).await?;
        tracing::debug!(collection = %name, records = collection.len(), "Collection written");
        Ok(())
    }

    /// Check the collection is declared. Holding the returned guard keeps other
    /// writers out until the caller is done.
    async fn lock_declared(
        &self,
        collection: &str,
    ) -> StorageResult<tokio::sync::MutexGuard<'_, Option<Manifest>>> {
        let guard = self.manifest.lock().await;
        let manifest = guard.as_ref().ok_or(StorageError::NotOpen)?;
        if !manifest.collections.contains(collection) {
            return Err(Error::CollectionNotFound(collection.to_string()).into());
        }
        Ok(guard)
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn open(&self, schema: &Schema) -> StorageResult<Upgrade> {
        let mut guard = self.manifest.lock().await;
        tokio::fs::create_dir_all(self.dir.join(COLLECTIONS_DIR)).await?;

        let stored = self.read_manifest().await?;
        let upgrade = schema.plan_upgrade(stored.as_ref())?;

        for name in &upgrade.created {
            // A file left over from an interrupted upgrade still holds data.
            if tokio::fs::try_exists(self.collection_path(name)).await? {
                continue;
            }
            self.write_collection(name, &Collection::new()).await?;
        }

        if !upgrade.is_noop() {
            write_atomic(
                &self.dir.join(MANIFEST_FILE),
                upgrade.manifest.to_json()?.as_bytes(),
            )
            .await?;
            tracing::info!(
                dir = %self.dir.display(),
                from = ?upgrade.from,
                to = upgrade.to,
                created = upgrade.created.len(),
                "Storage schema upgraded"
            );
        }

        *guard = Some(upgrade.manifest.clone());
        Ok(upgrade)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Value>> {
        let _guard = self.manifest.lock().await;
        Ok(self.read_collection(collection).await?.get(id).cloned())
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Value>> {
        let _guard = self.manifest.lock().await;
        Ok(self
            .read_collection(collection)
            .await?
            .into_records()
            .into_values()
            .collect())
    }

    async fn put(&self, collection: &str, record: Value) -> StorageResult<()> {
        let _guard = self.lock_declared(collection).await?;
        let mut current = self.read_collection(collection).await?;
        current.upsert(record)?;
        self.write_collection(collection, &current).await
    }

    async fn put_many(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        let _guard = self.lock_declared(collection).await?;
        let mut current = self.read_collection(collection).await?;
        for record in records {
            current.upsert(record)?;
        }
        self.write_collection(collection, &current).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        let _guard = self.lock_declared(collection).await?;
        let mut current = self.read_collection(collection).await?;
        if current.remove(id).is_some() {
            self.write_collection(collection, &current).await?;
        }
        Ok(())
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        let _guard = self.lock_declared(collection).await?;
        self.write_collection(collection, &Collection::new()).await
    }

    async fn replace(&self, collection: &str, records: Vec<Value>) -> StorageResult<()> {
        let _guard = self.lock_declared(collection).await?;
        let mut staged = Collection::new();
        for record in records {
            staged.upsert(record)?;
        }
        self.write_collection(collection, &staged).await
    }
}

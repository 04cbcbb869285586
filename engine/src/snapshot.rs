//! Snapshot format for persisting a collection.
//!
//! Snapshots are the bridge between an in-memory [`Collection`] and a file on
//! disk. They serialize deterministically (records keyed in a `BTreeMap`) so
//! the same contents always produce the same bytes.

use crate::{error::Result, Collection, CollectionName, Error, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Collection name, checked on load
    pub collection: CollectionName,
    /// Records keyed by id
    pub records: BTreeMap<RecordId, Value>,
}

impl CollectionSnapshot {
    /// Create an empty snapshot.
    pub fn new(collection: impl Into<CollectionName>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collection: collection.into(),
            records: BTreeMap::new(),
        }
    }

    /// Snapshot the contents of a collection.
    pub fn capture(name: impl Into<CollectionName>, collection: &Collection) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collection: name.into(),
            records: collection.records().clone(),
        }
    }

    /// Turn back into a collection.
    pub fn into_collection(self) -> Collection {
        Collection::from_records(self.records)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON, checking the format version and collection name.
    pub fn from_json(json: &str, expected: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        if snapshot.collection != expected {
            return Err(Error::InvalidSnapshot(format!(
                "collection mismatch: expected '{}', got '{}'",
                expected, snapshot.collection
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_empty_snapshot() {
        let snapshot = CollectionSnapshot::new("customers");
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn json_roundtrip() {
        let mut collection = Collection::new();
        collection.upsert(json!({"id": "c1", "name": "Acme"})).unwrap();

        let snapshot = CollectionSnapshot::capture("customers", &collection);
        let json = snapshot.to_json().unwrap();
        let restored = CollectionSnapshot::from_json(&json, "customers").unwrap();

        assert_eq!(restored.into_collection(), collection);
    }

    #[test]
    fn deterministic_serialization() {
        let mut first = Collection::new();
        first.upsert(json!({"id": "a"})).unwrap();
        first.upsert(json!({"id": "b"})).unwrap();

        let mut second = Collection::new();
        second.upsert(json!({"id": "b"})).unwrap();
        second.upsert(json!({"id": "a"})).unwrap();

        assert_eq!(
            CollectionSnapshot::capture("c", &first).to_json().unwrap(),
            CollectionSnapshot::capture("c", &second).to_json().unwrap()
        );
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{"formatVersion": 999, "collection": "customers", "records": {}}"#;
        let result = CollectionSnapshot::from_json(json, "customers");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_collection_mismatch() {
        let json = CollectionSnapshot::new("products").to_json().unwrap();
        let result = CollectionSnapshot::from_json(&json, "customers");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_corrupt_json() {
        let result = CollectionSnapshot::from_json("{not json", "customers");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }
}

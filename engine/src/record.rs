//! Record identity and collection partitions.

use crate::{error::Result, Error, RecordId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An entity with a stable, globally-unique identifier.
///
/// Application types implement this to be stored through the sync runtime.
/// The serialized form must be a JSON object whose `id` field equals
/// [`Record::id`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// The record's identifier.
    fn id(&self) -> &str;
}

/// Read the `id` field of a stored JSON record.
pub fn extract_id(value: &Value) -> Result<RecordId> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidPayload("record must be a JSON object".into()))?;

    match obj.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(Error::MissingRecordId),
    }
}

/// A named partition of records of one logical entity type.
///
/// Identifiers are unique within a collection. Iteration is ordered by id,
/// which keeps serialized output deterministic; insertion order carries no
/// meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    records: BTreeMap<RecordId, Value>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Build a collection from already keyed records.
    pub fn from_records(records: BTreeMap<RecordId, Value>) -> Self {
        Self { records }
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.records.get(id)
    }

    /// Insert or replace a record, returning the replaced value.
    pub fn upsert(&mut self, record: Value) -> Result<Option<Value>> {
        let id = extract_id(&record)?;
        Ok(self.records.insert(id, record))
    }

    /// Remove a record. Absent ids are not an error.
    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.records.remove(id)
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All records, ordered by id.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.records.values()
    }

    /// Consume into the keyed map.
    pub fn into_records(self) -> BTreeMap<RecordId, Value> {
        self.records
    }

    /// Borrow the keyed map.
    pub fn records(&self) -> &BTreeMap<RecordId, Value> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

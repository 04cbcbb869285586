//! Schema definition and versioned upgrades.
//!
//! A schema names the collections a store holds and carries a version. The
//! storage backend persists a [`Manifest`] and asks the schema for an
//! [`Upgrade`] plan when it is opened. Upgrades only ever add collections;
//! data in collections the store already has is never dropped.

use crate::{error::Result, CollectionName, Error, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reserved collection holding the outbox entries.
pub const OUTBOX_COLLECTION: &str = "_outbox";

/// Version of the manifest format for future compatibility.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Schema for the entire store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema version, bumped whenever collections are added
    pub version: SchemaVersion,
    /// Application collections
    pub collections: BTreeSet<CollectionName>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            collections: BTreeSet::new(),
        }
    }

    /// Add a collection (builder pattern).
    pub fn with_collection(mut self, name: impl Into<CollectionName>) -> Self {
        self.add_collection(name);
        self
    }

    /// Add a collection.
    pub fn add_collection(&mut self, name: impl Into<CollectionName>) {
        self.collections.insert(name.into());
    }

    /// Check that every application collection has a usable name.
    pub fn validate(&self) -> Result<()> {
        for name in &self.collections {
            validate_collection_name(name)?;
            if name.starts_with('_') {
                return Err(Error::ReservedCollection(name.clone()));
            }
        }
        Ok(())
    }

    /// Whether `name` is declared, counting the reserved outbox.
    pub fn contains(&self, name: &str) -> bool {
        name == OUTBOX_COLLECTION || self.collections.contains(name)
    }

    /// Every collection a backend must hold, outbox included.
    pub fn all_collections(&self) -> BTreeSet<CollectionName> {
        let mut all = self.collections.clone();
        all.insert(OUTBOX_COLLECTION.to_string());
        all
    }

    /// Plan the move from what a backend has stored to this schema.
    pub fn plan_upgrade(&self, stored: Option<&Manifest>) -> Result<Upgrade> {
        self.validate()?;
        let wanted = self.all_collections();

        let Some(stored) = stored else {
            return Ok(Upgrade {
                from: None,
                to: self.version,
                created: wanted.clone(),
                manifest: Manifest::new(self.version, wanted),
            });
        };

        if stored.schema_version > self.version {
            return Err(Error::SchemaDowngrade {
                stored: stored.schema_version,
                requested: self.version,
            });
        }

        let created: BTreeSet<_> = wanted.difference(&stored.collections).cloned().collect();
        let retained: BTreeSet<_> = wanted.union(&stored.collections).cloned().collect();

        Ok(Upgrade {
            from: Some(stored.schema_version),
            to: self.version,
            created,
            manifest: Manifest::new(self.version, retained),
        })
    }
}

/// What a backend persists about its layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub schema_version: SchemaVersion,
    pub collections: BTreeSet<CollectionName>,
}

impl Manifest {
    pub fn new(schema_version: SchemaVersion, collections: BTreeSet<CollectionName>) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            schema_version,
            collections,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if manifest.format_version > MANIFEST_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported manifest format version: {} (max supported: {})",
                manifest.format_version, MANIFEST_FORMAT_VERSION
            )));
        }

        Ok(manifest)
    }
}

/// Result of [`Schema::plan_upgrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    /// Stored version, `None` for a fresh store
    pub from: Option<SchemaVersion>,
    pub to: SchemaVersion,
    /// Collections that did not exist before
    pub created: BTreeSet<CollectionName>,
    /// Manifest to persist once the upgrade is applied
    pub manifest: Manifest,
}

impl Upgrade {
    /// Whether anything needs writing.
    pub fn is_noop(&self) -> bool {
        self.from == Some(self.to) && self.created.is_empty()
    }
}

/// Collection names end up in file names, so keep them to a safe alphabet.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCollectionName(name.to_string()))
    }
}

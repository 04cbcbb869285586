//! Error types for the Harbor engine.

use crate::{CollectionName, SchemaVersion};
use thiserror::Error;

/// All possible errors from the Harbor engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Record errors
    #[error("record has no string id field")]
    MissingRecordId,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Collection errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("invalid collection name: '{0}'")]
    InvalidCollectionName(String),

    #[error("collection name is reserved: {0}")]
    ReservedCollection(CollectionName),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("schema downgrade not supported: stored version {stored}, requested {requested}")]
    SchemaDowngrade {
        stored: SchemaVersion,
        requested: SchemaVersion,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

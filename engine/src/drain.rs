//! Outcome of replaying the outbox against the remote service.

use crate::{CollectionName, OpKind, OperationId, PendingOperation, RecordId};
use serde::{Deserialize, Serialize};

/// The entry a drain stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFailure {
    pub op_id: OperationId,
    pub collection: CollectionName,
    pub record_id: RecordId,
    pub kind: OpKind,
    /// Error reported by the remote service
    pub message: String,
}

impl ReplayFailure {
    pub fn new(op: &PendingOperation, message: impl Into<String>) -> Self {
        Self {
            op_id: op.id.clone(),
            collection: op.collection.clone(),
            record_id: op.record_id.clone(),
            kind: op.kind,
            message: message.into(),
        }
    }
}

/// Result of one drain attempt.
///
/// A drain replays entries in order and stops at the first failure, so
/// `replayed` is always a prefix of what was queued and `remaining` counts
/// the failed entry plus everything behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Operations confirmed by the remote and removed, in replay order
    pub replayed: Vec<OperationId>,
    /// Where the drain halted, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<ReplayFailure>,
    /// Entries still queued afterwards
    pub remaining: usize,
}

impl DrainReport {
    /// A drain that found nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when every entry seen was replayed.
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

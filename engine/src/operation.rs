//! Pending operations buffered in the outbox.
//!
//! Mutations that have not been confirmed by the remote system of record are
//! captured as operations, not applied remotely in place. This is what lets
//! the application keep working offline and replay later in issue order.

use crate::{error::Result, extract_id, CollectionName, Error, RecordId, Sequence, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Unique identifier for an operation.
pub type OperationId = String;

/// Width of the zero-padded sequence used as the outbox storage key.
const STORAGE_KEY_WIDTH: usize = 20;

/// The kind of mutation a pending operation replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Insert => write!(f, "insert"),
            OpKind::Update => write!(f, "update"),
            OpKind::Delete => write!(f, "delete"),
        }
    }
}

/// A mutation waiting to be applied to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Globally unique, time-ordered id; doubles as the remote idempotency key
    pub id: OperationId,
    /// Position in the outbox, strictly increasing in enqueue order
    pub seq: Sequence,
    /// Target collection
    pub collection: CollectionName,
    /// Record this operation targets
    pub record_id: RecordId,
    /// What to replay
    pub kind: OpKind,
    /// Full record for insert/update, `{"id": ..}` for delete
    pub payload: Value,
    /// When it was enqueued (milliseconds since epoch)
    pub enqueued_at: Timestamp,
}

impl PendingOperation {
    /// Create a pending operation. The record id is read from the payload.
    pub fn new(
        id: impl Into<OperationId>,
        seq: Sequence,
        collection: impl Into<CollectionName>,
        kind: OpKind,
        payload: Value,
        enqueued_at: Timestamp,
    ) -> Result<Self> {
        let record_id = extract_id(&payload)?;
        Ok(Self {
            id: id.into(),
            seq,
            collection: collection.into(),
            record_id,
            kind,
            payload,
            enqueued_at,
        })
    }

    /// Payload for a delete of `record_id`.
    pub fn delete_payload(record_id: &str) -> Value {
        json!({ "id": record_id })
    }

    /// Key under which this entry is persisted.
    ///
    /// Zero padding makes lexicographic key order equal to `seq` order, so a
    /// backend that returns records ordered by key returns them in replay
    /// order.
    pub fn storage_key(&self) -> String {
        storage_key(self.seq)
    }

    /// Serialize as the stored outbox record, keyed by the storage key.
    pub fn to_stored(&self) -> Result<Value> {
        serde_json::to_value(StoredEntry {
            id: self.storage_key(),
            op: self.clone(),
        })
        .map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Parse a stored record produced by [`PendingOperation::to_stored`].
    pub fn from_stored(value: Value) -> Result<Self> {
        let entry: StoredEntry =
            serde_json::from_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        Ok(entry.op)
    }
}

/// Outbox storage key for a sequence number.
pub fn storage_key(seq: Sequence) -> String {
    format!("{:0width$}", seq, width = STORAGE_KEY_WIDTH)
}

/// On-disk shape of an outbox entry: the operation plus its storage key as `id`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    id: String,
    op: PendingOperation,
}

/// Replay order is by sequence only.
impl Ord for PendingOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl PartialOrd for PendingOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for PendingOperation {}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(seq: Sequence, kind: OpKind) -> PendingOperation {
        PendingOperation::new(
            format!("op-{}", seq),
            seq,
            "customers",
            kind,
            json!({"id": "c1", "name": "Acme"}),
            1000 + seq,
        )
        .unwrap()
    }

    #[test]
    fn new_reads_record_id_from_payload() {
        let op = op(1, OpKind::Insert);
        assert_eq!(op.record_id, "c1");
        assert_eq!(op.collection, "customers");
        assert_eq!(op.kind, OpKind::Insert);
    }

    #[test]
    fn new_rejects_payload_without_id() {
        let result = PendingOperation::new(
            "op-1",
            1,
            "customers",
            OpKind::Update,
            json!({"name": "Acme"}),
            1000,
        );
        assert_eq!(result, Err(Error::MissingRecordId));
    }

    #[test]
    fn delete_payload_carries_id() {
        let payload = PendingOperation::delete_payload("c9");
        let op = PendingOperation::new("op-1", 1, "customers", OpKind::Delete, payload, 1000)
            .unwrap();
        assert_eq!(op.record_id, "c9");
        assert_eq!(op.payload, json!({"id": "c9"}));
    }

    #[test]
    fn storage_key_sorts_like_seq() {
        assert_eq!(storage_key(7), "00000000000000000007");
        assert!(storage_key(9) < storage_key(10));
        assert!(storage_key(99) < storage_key(100));
    }

    #[test]
    fn ordering_by_seq_only() {
        let first = op(2, OpKind::Update);
        let mut second = op(3, OpKind::Insert);
        second.enqueued_at = 0;
        assert!(first < second);
    }

    #[test]
    fn stored_form_keeps_operation() {
        let original = op(5, OpKind::Update);
        let stored = original.to_stored().unwrap();

        assert_eq!(stored["id"], json!(storage_key(5)));
        assert_eq!(stored["op"]["kind"], json!("update"));
        assert_eq!(stored["op"]["recordId"], json!("c1"));

        let parsed = PendingOperation::from_stored(stored).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn kind_display() {
        assert_eq!(OpKind::Insert.to_string(), "insert");
        assert_eq!(OpKind::Delete.to_string(), "delete");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_storage_key_order_matches_seq(a in any::<u64>(), b in any::<u64>()) {
                prop_assert_eq!(storage_key(a).cmp(&storage_key(b)), a.cmp(&b));
            }

            #[test]
            fn prop_sorting_entries_follows_seq(mut seqs in proptest::collection::vec(0u64..10_000, 0..50)) {
                let mut ops: Vec<_> = seqs.iter().map(|&seq| op(seq, OpKind::Update)).collect();
                ops.sort();
                seqs.sort_unstable();
                let sorted: Vec<_> = ops.iter().map(|op| op.seq).collect();
                prop_assert_eq!(sorted, seqs);
            }
        }
    }
}

//! Outbox Queue - the persisted, strictly ordered log of pending operations.
//!
//! Entries live in the reserved `_outbox` collection of the Durable Store,
//! keyed by their zero-padded sequence number. One queue spans every
//! collection: a later update to a record depends on an earlier insert of the
//! same record, so replay order is the global enqueue order.

use crate::error::StorageResult;
use crate::store::DurableStore;
use harbor_engine::{OpKind, PendingOperation, SequenceClock, Timestamp, OUTBOX_COLLECTION};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Ordered log of mutations not yet confirmed by the remote service.
#[derive(Debug)]
pub struct OutboxQueue {
    store: Arc<DurableStore>,
    clock: Mutex<SequenceClock>,
}

impl OutboxQueue {
    /// Open the queue over `store`, resuming the sequence after any entries
    /// that survived a restart.
    pub async fn open(store: Arc<DurableStore>) -> StorageResult<Self> {
        let entries = read_entries(&store).await?;
        let mut clock = SequenceClock::new();
        if let Some(last) = entries.last() {
            clock.observe(last.seq);
        }

        tracing::info!(pending = entries.len(), next_seq = clock.current() + 1, "Outbox opened");

        Ok(Self {
            store,
            clock: Mutex::new(clock),
        })
    }

    /// Append a new entry after every existing one.
    pub async fn enqueue(
        &self,
        collection: &str,
        kind: OpKind,
        payload: Value,
    ) -> StorageResult<PendingOperation> {
        let writer = self.store.write(OUTBOX_COLLECTION).await;
        let seq = self.clock.lock().await.tick();

        let op = PendingOperation::new(
            Uuid::now_v7().to_string(),
            seq,
            collection,
            kind,
            payload,
            now_millis(),
        )?;
        writer.put(op.to_stored()?).await?;

        tracing::debug!(
            op_id = %op.id,
            seq = op.seq,
            collection = %op.collection,
            record_id = %op.record_id,
            kind = %op.kind,
            "Operation enqueued"
        );
        Ok(op)
    }

    /// Every entry in enqueue order. Nothing is removed.
    pub async fn drain_all(&self) -> StorageResult<Vec<PendingOperation>> {
        read_entries(&self.store).await
    }

    /// Remove one entry once the remote confirmed it.
    pub async fn remove(&self, op: &PendingOperation) -> StorageResult<()> {
        self.store
            .delete(OUTBOX_COLLECTION, &op.storage_key())
            .await
    }

    /// Drop every entry.
    pub async fn clear(&self) -> StorageResult<()> {
        self.store.clear(OUTBOX_COLLECTION).await?;
        tracing::info!("Outbox cleared");
        Ok(())
    }

    /// Number of pending entries.
    pub async fn count(&self) -> StorageResult<usize> {
        Ok(self.store.get_all(OUTBOX_COLLECTION).await?.len())
    }
}

async fn read_entries(store: &DurableStore) -> StorageResult<Vec<PendingOperation>> {
    let mut entries = store
        .get_all(OUTBOX_COLLECTION)
        .await?
        .into_iter()
        .map(PendingOperation::from_stored)
        .collect::<harbor_engine::error::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Wall-clock milliseconds since the epoch, for `enqueued_at`.
pub(crate) fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

//! Sync Coordinator - the public mutation API.
//!
//! Every mutation is written to the Durable Store before the call returns.
//! While offline (and when the caller asks for sync) the mutation is also
//! appended to the Outbox Queue. When the Connectivity Monitor reports that
//! the network is back, a background task drains the queue against the
//! remote record service in enqueue order, stopping at the first failure.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{Result, SyncError};
use crate::handle::CollectionHandle;
use crate::outbox::OutboxQueue;
use crate::remote::RemoteRecordService;
use crate::storage::StorageBackend;
use crate::store::DurableStore;
use harbor_engine::{
    extract_id, ConnectivityState, DrainReport, OpKind, PendingOperation, Record, ReplayFailure,
    Schema, OUTBOX_COLLECTION,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Orchestrates the store, the outbox and replay.
///
/// Cheap to clone; clones share one instance. Create with
/// [`SyncCoordinator::open`] or [`SyncCoordinator::init`], stop with
/// [`SyncCoordinator::dispose`].
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<DurableStore>,
    outbox: Arc<OutboxQueue>,
    monitor: ConnectivityMonitor,
    remote: Arc<dyn RemoteRecordService>,
    /// Held for the whole of a drain so two drains never replay one entry
    drain_lock: Mutex<()>,
    reports: watch::Sender<Option<DrainReport>>,
    /// Never held across an await
    auto_drain: std::sync::Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("state", &self.inner.monitor.state())
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Open the store and outbox over `backend` and start the coordinator.
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        schema: Schema,
        monitor: ConnectivityMonitor,
        remote: Arc<dyn RemoteRecordService>,
    ) -> Result<Self> {
        let store = Arc::new(DurableStore::open(backend, schema).await?);
        let outbox = Arc::new(OutboxQueue::open(store.clone()).await?);
        Ok(Self::init(store, outbox, monitor, remote))
    }

    /// Start a coordinator over already opened parts.
    ///
    /// Spawns the task that drains on every Offline -> Online transition, so
    /// this must be called from within a Tokio runtime.
    pub fn init(
        store: Arc<DurableStore>,
        outbox: Arc<OutboxQueue>,
        monitor: ConnectivityMonitor,
        remote: Arc<dyn RemoteRecordService>,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        let transitions = monitor.subscribe();

        let inner = Arc::new(Inner {
            store,
            outbox,
            monitor,
            remote,
            drain_lock: Mutex::new(()),
            reports,
            auto_drain: std::sync::Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let handle = tokio::spawn(auto_drain(Arc::downgrade(&inner), transitions));
        *inner
            .auto_drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!(state = %inner.monitor.state(), "Sync coordinator started");
        Self { inner }
    }

    /// Stop automatic draining and refuse further calls.
    ///
    /// A drain already in progress is allowed to finish first.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _drain = self.inner.drain_lock.lock().await;
        let handle = self
            .inner
            .auto_drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        tracing::info!("Sync coordinator disposed");
    }

    fn ensure_active(&self) -> Result<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(SyncError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Application calls may not touch the reserved outbox collection.
    fn ensure_application_collection(collection: &str) -> Result<()> {
        if collection == OUTBOX_COLLECTION {
            return Err(harbor_engine::Error::ReservedCollection(collection.to_string()).into());
        }
        Ok(())
    }

    /// Observable per-collection surface.
    pub fn collection<T: Record + Clone>(&self, name: &str) -> CollectionHandle<T> {
        CollectionHandle::new(self.clone(), name)
    }

    pub fn store(&self) -> &Arc<DurableStore> {
        &self.inner.store
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.inner.monitor.state()
    }

    pub fn is_online(&self) -> bool {
        self.inner.monitor.is_online()
    }

    /// Number of mutations waiting for the remote.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.inner.outbox.count().await?)
    }

    /// The queued mutations, in replay order.
    pub async fn pending(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.inner.outbox.drain_all().await?)
    }

    /// Every record of `collection` from the Durable Store.
    pub async fn load<T: Record>(&self, collection: &str) -> Result<Vec<T>> {
        self.ensure_active()?;
        Self::ensure_application_collection(collection)?;
        self.inner
            .store
            .get_all(collection)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(SyncError::from))
            .collect()
    }

    /// Replace the local collection with authoritative remote data.
    ///
    /// Nothing is queued.
    pub async fn save_all<T: Record>(&self, collection: &str, records: &[T]) -> Result<()> {
        self.ensure_active()?;
        Self::ensure_application_collection(collection)?;
        let values = records.iter().map(to_payload).collect::<Result<Vec<_>>>()?;
        let count = values.len();

        self.inner.store.replace_all(collection, values).await?;
        tracing::info!(collection, records = count, "Collection replaced");
        Ok(())
    }

    /// Store a new record; queue an insert if offline and `should_sync`.
    pub async fn add<T: Record>(
        &self,
        collection: &str,
        record: &T,
        should_sync: bool,
    ) -> Result<Option<PendingOperation>> {
        let payload = to_payload(record)?;
        self.write_through(collection, OpKind::Insert, payload, should_sync)
            .await
    }

    /// Replace a record; queue an update if offline and `should_sync`.
    pub async fn update<T: Record>(
        &self,
        collection: &str,
        record: &T,
        should_sync: bool,
    ) -> Result<Option<PendingOperation>> {
        let payload = to_payload(record)?;
        self.write_through(collection, OpKind::Update, payload, should_sync)
            .await
    }

    /// Delete a record; queue a delete if offline and `should_sync`.
    pub async fn remove(
        &self,
        collection: &str,
        id: &str,
        should_sync: bool,
    ) -> Result<Option<PendingOperation>> {
        let payload = PendingOperation::delete_payload(id);
        self.write_through(collection, OpKind::Delete, payload, should_sync)
            .await
    }

    /// Apply a mutation locally and queue it when it cannot be sent now.
    ///
    /// The entry is queued before the record is written, so an interruption
    /// between the two commits can cost the local copy but never the remote
    /// one. If the store write fails the entry is taken back out and the
    /// call fails with nothing changed.
    async fn write_through(
        &self,
        collection: &str,
        kind: OpKind,
        payload: Value,
        should_sync: bool,
    ) -> Result<Option<PendingOperation>> {
        self.ensure_active()?;
        Self::ensure_application_collection(collection)?;
        let record_id = extract_id(&payload)?;

        let writer = self.inner.store.write(collection).await;

        let queued = if should_sync && !self.is_online() {
            Some(
                self.inner
                    .outbox
                    .enqueue(collection, kind, payload.clone())
                    .await?,
            )
        } else {
            None
        };

        let applied = match kind {
            OpKind::Delete => writer.delete(&record_id).await,
            OpKind::Insert | OpKind::Update => writer.put(payload).await,
        };

        if let Err(e) = applied {
            if let Some(op) = &queued {
                if let Err(rollback) = self.inner.outbox.remove(op).await {
                    tracing::error!(
                        op_id = %op.id,
                        collection,
                        record_id = %record_id,
                        error = %rollback,
                        "Failed to withdraw queued operation after store failure"
                    );
                }
            }
            tracing::warn!(collection, record_id = %record_id, %kind, error = %e, "Local write failed");
            return Err(e.into());
        }

        tracing::debug!(
            collection,
            record_id = %record_id,
            %kind,
            queued = queued.is_some(),
            "Local write"
        );
        Ok(queued)
    }

    /// Replay queued mutations against the remote service.
    ///
    /// Entries are replayed in enqueue order; each is removed as soon as the
    /// remote confirms it. The first remote failure halts the drain and leaves
    /// that entry and everything after it queued. Remote failures are
    /// reported in the returned [`DrainReport`], not as an error; only local
    /// storage failures are errors.
    pub async fn drain(&self) -> Result<DrainReport> {
        self.ensure_active()?;
        let _guard = self.inner.drain_lock.lock().await;

        let entries = self.inner.outbox.drain_all().await?;
        if entries.is_empty() {
            tracing::debug!("Outbox empty, nothing to drain");
            let report = DrainReport::empty();
            self.inner.reports.send_replace(Some(report.clone()));
            return Ok(report);
        }

        tracing::info!(pending = entries.len(), "Draining outbox");
        let mut report = DrainReport::empty();

        for op in &entries {
            match self.inner.remote.apply(op).await {
                Ok(()) => {
                    self.inner.outbox.remove(op).await?;
                    tracing::debug!(
                        op_id = %op.id,
                        collection = %op.collection,
                        record_id = %op.record_id,
                        kind = %op.kind,
                        "Operation replayed"
                    );
                    report.replayed.push(op.id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        op_id = %op.id,
                        collection = %op.collection,
                        record_id = %op.record_id,
                        kind = %op.kind,
                        error = %e,
                        "Replay failed, halting drain"
                    );
                    report.halted = Some(ReplayFailure::new(op, e.to_string()));
                    break;
                }
            }
        }

        report.remaining = self.inner.outbox.count().await?;
        tracing::info!(
            replayed = report.replayed.len(),
            remaining = report.remaining,
            complete = report.is_complete(),
            "Drain finished"
        );

        self.inner.reports.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// Drop every queued mutation without replaying it.
    pub async fn discard_pending(&self) -> Result<()> {
        self.ensure_active()?;
        let _guard = self.inner.drain_lock.lock().await;
        Ok(self.inner.outbox.clear().await?)
    }

    /// Outcome of the most recent drain, for surfacing failures to the user.
    pub fn last_drain(&self) -> Option<DrainReport> {
        self.inner.reports.borrow().clone()
    }

    /// Receiver that wakes after every drain.
    pub fn drain_reports(&self) -> watch::Receiver<Option<DrainReport>> {
        self.inner.reports.subscribe()
    }
}

/// Serialize a record and check its `id` field agrees with [`Record::id`].
fn to_payload<T: Record>(record: &T) -> Result<Value> {
    let value = serde_json::to_value(record)?;
    let id = extract_id(&value)?;
    if id != record.id() {
        return Err(harbor_engine::Error::InvalidPayload(format!(
            "serialized id '{}' does not match record id '{}'",
            id,
            record.id()
        ))
        .into());
    }
    Ok(value)
}

async fn auto_drain(inner: Weak<Inner>, mut transitions: watch::Receiver<ConnectivityState>) {
    while transitions.changed().await.is_ok() {
        let state = *transitions.borrow_and_update();
        if !state.is_online() {
            continue;
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = SyncCoordinator { inner };

        tracing::info!("Connectivity restored, draining outbox");
        match coordinator.drain().await {
            Ok(_) => {}
            Err(SyncError::Disposed) => break,
            Err(e) => tracing::error!(error = %e, "Automatic drain failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;

    struct NullRemote;

    #[async_trait]
    impl RemoteRecordService for NullRemote {
        async fn insert(&self, _: &str, _: &Value, _: &str) -> std::result::Result<(), RemoteError> {
            Ok(())
        }

        async fn update(&self, _: &str, _: &Value, _: &str) -> std::result::Result<(), RemoteError> {
            Ok(())
        }

        async fn delete(&self, _: &str, _: &str, _: &str) -> std::result::Result<(), RemoteError> {
            Ok(())
        }
    }

    async fn open_coordinator() -> SyncCoordinator {
        SyncCoordinator::open(
            Arc::new(MemoryBackend::new()),
            Schema::new(1).with_collection("customers"),
            ConnectivityMonitor::new(ConnectivityState::Offline),
            Arc::new(NullRemote),
        )
        .await
        .unwrap()
    }

    fn auto_drain_handle(coordinator: &SyncCoordinator) -> Option<bool> {
        coordinator
            .inner
            .auto_drain
            .lock()
            .unwrap()
            .as_ref()
            .map(JoinHandle::is_finished)
    }

    #[tokio::test]
    async fn init_keeps_auto_drain_handle() {
        let coordinator = open_coordinator().await;
        assert_eq!(auto_drain_handle(&coordinator), Some(false));
    }

    #[tokio::test]
    async fn dispose_aborts_auto_drain_task() {
        let coordinator = open_coordinator().await;
        let task = coordinator
            .inner
            .auto_drain
            .lock()
            .unwrap()
            .as_ref()
            .map(JoinHandle::abort_handle)
            .unwrap();

        coordinator.dispose().await;

        assert_eq!(auto_drain_handle(&coordinator), None);
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !task.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("auto drain task still running");
    }
}

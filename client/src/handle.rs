//! Per-collection view for UI code.
//!
//! A [`CollectionHandle`] is the surface the CRUD layer binds to:
//! `data`, `is_online`, `pending_count`, and the five record operations. It
//! keeps an in-memory copy of the collection in step with the Durable Store.

use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use harbor_engine::{CollectionName, Record};

/// Observable state and operations for one collection.
#[derive(Debug)]
pub struct CollectionHandle<T> {
    coordinator: SyncCoordinator,
    name: CollectionName,
    data: Vec<T>,
}

impl<T: Record + Clone> CollectionHandle<T> {
    pub(crate) fn new(coordinator: SyncCoordinator, name: &str) -> Self {
        Self {
            coordinator,
            name: name.to_string(),
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The in-memory view; empty until [`CollectionHandle::load`].
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn is_online(&self) -> bool {
        self.coordinator.is_online()
    }

    /// Mutations waiting for the remote, across all collections.
    pub async fn pending_count(&self) -> Result<usize> {
        self.coordinator.pending_count().await
    }

    /// Refresh the view from the Durable Store.
    pub async fn load(&mut self) -> Result<&[T]> {
        self.data = self.coordinator.load(&self.name).await?;
        Ok(&self.data)
    }

    /// Replace the collection with authoritative remote data.
    pub async fn save_all(&mut self, records: Vec<T>) -> Result<()> {
        self.coordinator.save_all(&self.name, &records).await?;
        self.load().await?;
        Ok(())
    }

    pub async fn add(&mut self, record: T, should_sync: bool) -> Result<()> {
        self.coordinator
            .add(&self.name, &record, should_sync)
            .await?;
        self.upsert_view(record);
        Ok(())
    }

    pub async fn update(&mut self, record: T, should_sync: bool) -> Result<()> {
        self.coordinator
            .update(&self.name, &record, should_sync)
            .await?;
        self.upsert_view(record);
        Ok(())
    }

    pub async fn remove(&mut self, id: &str, should_sync: bool) -> Result<()> {
        self.coordinator.remove(&self.name, id, should_sync).await?;
        self.data.retain(|r| r.id() != id);
        Ok(())
    }

    fn upsert_view(&mut self, record: T) {
        match self.data.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => self.data.push(record),
        }
    }
}

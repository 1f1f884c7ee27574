//! In-memory snapshot store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::EventStoreError;

use super::{Snapshot, SnapshotStore};

type Key = (Uuid, AggregateType);

/// Snapshot store keeping every version in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<Key, BTreeMap<i64, Snapshot>>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), EventStoreError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots
            .entry((snapshot.aggregate_id, snapshot.aggregate_type))
            .or_default()
            .insert(snapshot.version, snapshot);
        Ok(())
    }

    async fn load_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_id, aggregate_type))
            .and_then(|versions| versions.values().next_back())
            .cloned())
    }

    async fn load_by_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
        version: i64,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_id, aggregate_type))
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    async fn exists(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<bool, EventStoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_id, aggregate_type))
            .is_some_and(|versions| !versions.is_empty()))
    }

    async fn get_latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<i64>, EventStoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_id, aggregate_type))
            .and_then(|versions| versions.keys().next_back().copied()))
    }

    async fn remove_all(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<u64, EventStoreError> {
        let mut snapshots = self.snapshots.write().await;
        Ok(snapshots
            .remove(&(aggregate_id, aggregate_type))
            .map_or(0, |versions| versions.len() as u64))
    }
}

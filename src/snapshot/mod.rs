//! Snapshot module
//!
//! Point-in-time copies of aggregate state. Snapshots only speed up loading:
//! the event log stays the source of truth, and any snapshot failure falls
//! back to a full replay.

mod codec;
mod memory;
mod postgres;
mod strategy;

pub use codec::{JsonSnapshotCodec, SnapshotCodec, Snapshotable};
pub use memory::InMemorySnapshotStore;
pub use postgres::PgSnapshotStore;
pub use strategy::{
    FrequencySnapshotStrategy, NeverSnapshot, SnapshotStrategy, DEFAULT_SNAPSHOT_FREQUENCY,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::EventStoreError;

/// Serialized state of one aggregate after `version` events
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub aggregate_id: Uuid,
    pub aggregate_type: AggregateType,
    pub version: i64,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Storage of snapshots, keyed by aggregate and version
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert or replace the snapshot at its version
    async fn save(&self, snapshot: Snapshot) -> Result<(), EventStoreError>;

    /// Snapshot with the highest version
    async fn load_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<Snapshot>, EventStoreError>;

    async fn load_by_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
        version: i64,
    ) -> Result<Option<Snapshot>, EventStoreError>;

    async fn exists(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<bool, EventStoreError>;

    async fn get_latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<i64>, EventStoreError>;

    /// Remove every snapshot of the aggregate, returning how many were removed
    async fn remove_all(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<u64, EventStoreError>;
}

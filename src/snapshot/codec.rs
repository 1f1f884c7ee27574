//! Conversion between aggregates and snapshot documents.

use std::marker::PhantomData;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::event_store::EventStoreError;

use super::Snapshot;

/// Aggregate with a serializable state document
///
/// The document holds business state only. The version is kept on the
/// snapshot itself and handed back on restore.
pub trait Snapshotable: Aggregate {
    type State: Serialize + DeserializeOwned + Send + Sync;

    fn to_state(&self) -> Self::State;

    fn from_state(state: Self::State, version: i64) -> Self;
}

/// Turns an aggregate into a snapshot and back
pub trait SnapshotCodec<A: Aggregate>: Send + Sync {
    fn create_snapshot(&self, aggregate: &A) -> Result<Snapshot, EventStoreError>;

    fn restore_from_snapshot(&self, snapshot: &Snapshot) -> Result<A, EventStoreError>;
}

/// JSON codec for any [`Snapshotable`] aggregate
pub struct JsonSnapshotCodec<A> {
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> JsonSnapshotCodec<A> {
    pub fn new() -> Self {
        Self {
            _aggregate: PhantomData,
        }
    }
}

impl<A> Default for JsonSnapshotCodec<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Snapshotable> SnapshotCodec<A> for JsonSnapshotCodec<A> {
    fn create_snapshot(&self, aggregate: &A) -> Result<Snapshot, EventStoreError> {
        Ok(Snapshot {
            aggregate_id: aggregate.id(),
            aggregate_type: A::aggregate_type(),
            version: aggregate.version(),
            data: serde_json::to_value(aggregate.to_state())?,
            created_at: Utc::now(),
        })
    }

    fn restore_from_snapshot(&self, snapshot: &Snapshot) -> Result<A, EventStoreError> {
        if snapshot.aggregate_type != A::aggregate_type() {
            return Err(EventStoreError::InvalidSnapshot {
                aggregate_id: snapshot.aggregate_id,
                reason: format!(
                    "expected {} snapshot, found {}",
                    A::aggregate_type(),
                    snapshot.aggregate_type
                ),
            });
        }

        let state: A::State = serde_json::from_value(snapshot.data.clone())?;
        let aggregate = A::from_state(state, snapshot.version);

        if aggregate.id() != snapshot.aggregate_id {
            return Err(EventStoreError::InvalidSnapshot {
                aggregate_id: snapshot.aggregate_id,
                reason: format!("document belongs to aggregate {}", aggregate.id()),
            });
        }

        Ok(aggregate)
    }
}

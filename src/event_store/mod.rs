//! Event Store module
//!
//! Persistence layer for Event Sourcing: the append-only event log, the
//! serializers that turn domain events into stored documents, and the generic
//! repository that loads and saves aggregates.

mod error;
mod memory;
mod postgres;
mod record;
mod repository;
mod serializer;

pub use error::EventStoreError;
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use record::{NewEvent, StoredEvent};
pub use repository::{EventStoreRepository, Persistence};
pub use serializer::{
    CompositeEventSerializer, ContextSerializer, EventSerializer, OrderEventSerializer,
    ProjectEventSerializer, UserEventSerializer,
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::EventType;

/// Append-only, per-aggregate, version-ordered event log
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` after `expected_version`.
    ///
    /// Fails with [`EventStoreError::ConcurrencyConflict`] when the stream is
    /// not at `expected_version`. Either every event is stored or none is.
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<(), EventStoreError>;

    /// Whole stream, ascending by version; empty if the aggregate is unknown
    async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events with `version >= from_version`, ascending
    async fn get_events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Highest stored version, 0 when the stream is empty
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError>;

    /// Ids of aggregates whose stream holds an `event_type` event with payload
    /// `field` equal to `value`.
    ///
    /// This scans the log and is meant for rare paths where no read model
    /// is available.
    async fn find_aggregate_ids(
        &self,
        event_type: EventType,
        field: &str,
        value: &str,
    ) -> Result<Vec<Uuid>, EventStoreError>;
}

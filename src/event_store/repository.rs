//! Event Store Repository
//!
//! Loads aggregates from snapshot plus event replay and saves their pending
//! events under an expected-version check. One generic repository serves
//! every aggregate type; only the snapshot codec differs.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::dispatch::{EventDispatcher, NoopDispatcher};
use crate::domain::{AggregateEvent, DomainEvent};
use crate::snapshot::{
    FrequencySnapshotStrategy, InMemorySnapshotStore, JsonSnapshotCodec, PgSnapshotStore,
    SnapshotCodec, SnapshotStore, SnapshotStrategy, Snapshotable,
};

use super::{
    CompositeEventSerializer, EventStore, EventStoreError, InMemoryEventStore, PgEventStore,
    StoredEvent,
};

/// Collaborators shared by every repository
#[derive(Clone)]
pub struct Persistence {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
    snapshot_strategy: Arc<dyn SnapshotStrategy>,
    serializer: Arc<CompositeEventSerializer>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl Persistence {
    /// Stores with the default serializer, frequency strategy and no dispatch
    pub fn new(event_store: Arc<dyn EventStore>, snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            event_store,
            snapshot_store,
            snapshot_strategy: Arc::new(FrequencySnapshotStrategy::default()),
            serializer: Arc::new(CompositeEventSerializer::with_default_contexts()),
            dispatcher: Arc::new(NoopDispatcher),
        }
    }

    /// PostgreSQL stores sharing one pool
    pub fn postgres(pool: PgPool, snapshot_frequency: u32) -> Self {
        Self::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(PgSnapshotStore::new(pool)),
        )
        .with_snapshot_strategy(Arc::new(FrequencySnapshotStrategy::new(snapshot_frequency)))
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
        )
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_snapshot_strategy(mut self, strategy: Arc<dyn SnapshotStrategy>) -> Self {
        self.snapshot_strategy = strategy;
        self
    }

    pub fn with_snapshot_store(mut self, snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = snapshot_store;
        self
    }

    pub fn with_serializer(mut self, serializer: CompositeEventSerializer) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    pub fn snapshot_store(&self) -> &Arc<dyn SnapshotStore> {
        &self.snapshot_store
    }

    pub fn dispatcher(&self) -> &Arc<dyn EventDispatcher> {
        &self.dispatcher
    }
}

/// Repository for one aggregate type
pub struct EventStoreRepository<A: Aggregate> {
    persistence: Persistence,
    codec: Arc<dyn SnapshotCodec<A>>,
}

impl<A: Aggregate> Clone for EventStoreRepository<A> {
    fn clone(&self) -> Self {
        Self {
            persistence: self.persistence.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<A: Snapshotable> EventStoreRepository<A> {
    /// Repository using the JSON state document of the aggregate
    pub fn new(persistence: Persistence) -> Self {
        Self::with_codec(persistence, Arc::new(JsonSnapshotCodec::<A>::new()))
    }
}

impl<A: Aggregate> EventStoreRepository<A> {
    pub fn with_codec(persistence: Persistence, codec: Arc<dyn SnapshotCodec<A>>) -> Self {
        Self { persistence, codec }
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Append the pending events of `aggregate`.
    ///
    /// Does nothing when there is nothing pending. A concurrency conflict is
    /// returned unchanged and leaves the pending events in place.
    pub async fn save(&self, aggregate: &mut A) -> Result<(), EventStoreError> {
        let pending = aggregate.pending_events();
        if pending.is_empty() {
            return Ok(());
        }

        let aggregate_id = aggregate.id();
        let pending_count = pending.len() as i64;
        let expected_version = aggregate.version() - pending_count;

        let events: Vec<DomainEvent> = pending.iter().cloned().map(Into::into).collect();
        let records = events
            .iter()
            .map(|event| self.persistence.serializer.encode(event))
            .collect::<Result<Vec<_>, _>>()?;

        self.persistence
            .event_store
            .append(aggregate_id, records, expected_version)
            .await?;

        let new_version = expected_version + pending_count;
        tracing::debug!(
            aggregate_type = %A::aggregate_type(),
            aggregate_id = %aggregate_id,
            version = new_version,
            "Saved aggregate"
        );

        if self
            .persistence
            .snapshot_strategy
            .should_create_snapshot(aggregate_id, new_version)
        {
            if let Err(e) = self.write_snapshot(aggregate, new_version).await {
                tracing::warn!(error = %e, "Snapshot skipped");
            }
        }

        aggregate.clear_pending_events();

        self.persistence.dispatcher.dispatch(&events).await
    }

    async fn write_snapshot(&self, aggregate: &A, version: i64) -> Result<(), EventStoreError> {
        let snapshot_write = |reason: String| EventStoreError::SnapshotWrite {
            aggregate_id: aggregate.id(),
            version,
            reason,
        };

        let snapshot = self
            .codec
            .create_snapshot(aggregate)
            .map_err(|e| snapshot_write(e.to_string()))?;

        self.persistence
            .snapshot_store
            .save(snapshot)
            .await
            .map_err(|e| snapshot_write(e.to_string()))?;

        tracing::debug!(
            aggregate_type = %A::aggregate_type(),
            aggregate_id = %aggregate.id(),
            version,
            "Snapshot written"
        );

        Ok(())
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Rebuild the aggregate, starting from its latest snapshot when one is
    /// usable. Returns `None` when the stream is empty.
    pub async fn load(&self, aggregate_id: Uuid) -> Result<Option<A>, EventStoreError> {
        if let Some(mut aggregate) = self.restore_latest(aggregate_id).await {
            let events = self
                .persistence
                .event_store
                .get_events_from_version(aggregate_id, aggregate.version() + 1)
                .await?;
            self.replay(&mut aggregate, &events)?;
            return Ok(Some(aggregate));
        }

        let events = self.persistence.event_store.get_events(aggregate_id).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut aggregate = A::blank(aggregate_id);
        self.replay(&mut aggregate, &events)?;
        Ok(Some(aggregate))
    }

    /// Latest snapshot restored into an aggregate, or `None` when there is
    /// none or it cannot be used
    async fn restore_latest(&self, aggregate_id: Uuid) -> Option<A> {
        let snapshot = match self
            .persistence
            .snapshot_store
            .load_latest(aggregate_id, A::aggregate_type())
            .await
        {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    error = %e,
                    "Snapshot read failed, replaying full stream"
                );
                return None;
            }
        };

        match self.codec.restore_from_snapshot(&snapshot) {
            Ok(aggregate) => Some(aggregate),
            Err(e) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    version = snapshot.version,
                    error = %e,
                    "Snapshot restore failed, replaying full stream"
                );
                None
            }
        }
    }

    fn replay(&self, aggregate: &mut A, events: &[StoredEvent]) -> Result<(), EventStoreError> {
        for stored in events {
            let event = self.persistence.serializer.decode(stored)?;
            let event = <A::Event as AggregateEvent>::from_domain(event).map_err(|other| {
                EventStoreError::UnknownEventType {
                    aggregate_type: A::aggregate_type(),
                    event_type: other.event_type().to_string(),
                }
            })?;
            aggregate.catch_up(&event);
        }
        Ok(())
    }

    /// True iff the event stream is non-empty
    pub async fn exists(&self, aggregate_id: Uuid) -> Result<bool, EventStoreError> {
        Ok(self
            .persistence
            .event_store
            .current_version(aggregate_id)
            .await?
            > 0)
    }
}

//! In-memory event store.
//!
//! Used by tests and local runs without a database. Appends are serialized
//! behind one mutex, which gives the same compare-and-append guarantee the
//! database gets from its primary key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::EventType;

use super::record::payload_field_text;
use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

/// Event store keeping every stream in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<Mutex<HashMap<Uuid, Vec<StoredEvent>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across all streams
    pub async fn len(&self) -> usize {
        self.streams.lock().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut streams = self.streams.lock().await;
        let stream = streams.entry(aggregate_id).or_default();

        let actual = stream.last().map_or(0, |event| event.version);
        if actual != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        stream.extend(events.iter().enumerate().map(|(offset, event)| {
            StoredEvent::from_new(aggregate_id, expected_version + offset as i64 + 1, event)
        }));

        tracing::trace!(
            aggregate_id = %aggregate_id,
            appended = events.len(),
            version = expected_version + events.len() as i64,
            "Appended events"
        );

        Ok(())
    }

    async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.get_events_from_version(aggregate_id, 1).await
    }

    async fn get_events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.lock().await;
        let events = streams
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|event| event.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let streams = self.streams.lock().await;
        Ok(streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(0, |event| event.version))
    }

    async fn find_aggregate_ids(
        &self,
        event_type: EventType,
        field: &str,
        value: &str,
    ) -> Result<Vec<Uuid>, EventStoreError> {
        let streams = self.streams.lock().await;
        let mut ids: Vec<Uuid> = streams
            .iter()
            .filter(|(_, stream)| {
                stream.iter().any(|event| {
                    event.event_type == event_type.as_str()
                        && payload_field_text(&event.event_data, field).as_deref() == Some(value)
                })
            })
            .map(|(id, _)| *id)
            .collect();

        ids.sort();
        Ok(ids)
    }
}

//! Event serializers.
//!
//! Each bounded context registers one serializer; the composite picks the
//! first registered serializer that supports an event type. A missing
//! registration is a configuration error and is never papered over.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{AggregateEvent, DomainEvent, EventType, OrderEvent, ProjectEvent, UserEvent};

use super::{EventStoreError, NewEvent, StoredEvent};

/// Converts domain events to and from stored JSON documents
pub trait EventSerializer: Send + Sync {
    fn supports(&self, event_type: EventType) -> bool;

    fn serialize(&self, event: &DomainEvent) -> Result<serde_json::Value, EventStoreError>;

    fn deserialize(
        &self,
        data: &serde_json::Value,
        event_type: EventType,
    ) -> Result<DomainEvent, EventStoreError>;
}

/// Serializer for all events of one bounded context
pub struct ContextSerializer<E> {
    _event: PhantomData<fn() -> E>,
}

pub type ProjectEventSerializer = ContextSerializer<ProjectEvent>;
pub type OrderEventSerializer = ContextSerializer<OrderEvent>;
pub type UserEventSerializer = ContextSerializer<UserEvent>;

impl<E> ContextSerializer<E> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for ContextSerializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSerializer for ContextSerializer<E>
where
    E: AggregateEvent + Serialize + DeserializeOwned,
{
    fn supports(&self, event_type: EventType) -> bool {
        event_type.aggregate_type() == E::AGGREGATE_TYPE
    }

    fn serialize(&self, event: &DomainEvent) -> Result<serde_json::Value, EventStoreError> {
        let event = E::from_domain_ref(event)
            .ok_or_else(|| EventStoreError::UnsupportedEventType(event.event_type().to_string()))?;

        Ok(serde_json::to_value(event)?)
    }

    fn deserialize(
        &self,
        data: &serde_json::Value,
        event_type: EventType,
    ) -> Result<DomainEvent, EventStoreError> {
        if !self.supports(event_type) {
            return Err(EventStoreError::UnsupportedEventType(event_type.to_string()));
        }

        let event = E::deserialize(data)?;
        if event.event_type() != event_type {
            return Err(EventStoreError::EventTypeMismatch {
                expected: event_type.to_string(),
                found: event.event_type().to_string(),
            });
        }

        Ok(event.into())
    }
}

/// Tries each registered serializer in registration order
#[derive(Default)]
pub struct CompositeEventSerializer {
    serializers: Vec<Box<dyn EventSerializer>>,
}

impl CompositeEventSerializer {
    /// Composite without any registration
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite with the Project, Order and User serializers registered
    pub fn with_default_contexts() -> Self {
        Self::new()
            .register(ProjectEventSerializer::new())
            .register(OrderEventSerializer::new())
            .register(UserEventSerializer::new())
    }

    pub fn register(mut self, serializer: impl EventSerializer + 'static) -> Self {
        self.serializers.push(Box::new(serializer));
        self
    }

    fn serializer_for(&self, event_type: EventType) -> Result<&dyn EventSerializer, EventStoreError> {
        self.serializers
            .iter()
            .find(|serializer| serializer.supports(event_type))
            .map(|serializer| serializer.as_ref())
            .ok_or_else(|| EventStoreError::UnsupportedEventType(event_type.to_string()))
    }

    /// Serialize an event into a record ready to append
    pub fn encode(&self, event: &DomainEvent) -> Result<NewEvent, EventStoreError> {
        Ok(NewEvent {
            event_type: event.event_type(),
            event_data: self.serialize(event)?,
            occurred_at: event.occurred_at(),
        })
    }

    /// Deserialize a stored row, interpreting its raw discriminator
    pub fn decode(&self, stored: &StoredEvent) -> Result<DomainEvent, EventStoreError> {
        let event_type: EventType = stored
            .event_type
            .parse()
            .map_err(|_| EventStoreError::UnsupportedEventType(stored.event_type.clone()))?;

        self.deserialize(&stored.event_data, event_type)
    }
}

impl EventSerializer for CompositeEventSerializer {
    fn supports(&self, event_type: EventType) -> bool {
        self.serializers
            .iter()
            .any(|serializer| serializer.supports(event_type))
    }

    fn serialize(&self, event: &DomainEvent) -> Result<serde_json::Value, EventStoreError> {
        self.serializer_for(event.event_type())?.serialize(event)
    }

    fn deserialize(
        &self,
        data: &serde_json::Value,
        event_type: EventType,
    ) -> Result<DomainEvent, EventStoreError> {
        self.serializer_for(event_type)?.deserialize(data, event_type)
    }
}

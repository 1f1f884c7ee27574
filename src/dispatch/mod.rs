//! Event dispatch
//!
//! Committed events are handed to a dispatcher after every successful save.
//! The [`EventBus`] fans them out to subscribers in subscription order.

mod cleanup;

pub use cleanup::UserCleanupSubscriber;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::DomainEvent;
use crate::event_store::EventStoreError;

/// Receives events after they are committed to the event log
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, events: &[DomainEvent]) -> Result<(), EventStoreError>;
}

/// Reacts to committed events
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventStoreError>;
}

/// Dispatcher that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl EventDispatcher for NoopDispatcher {
    async fn dispatch(&self, _events: &[DomainEvent]) -> Result<(), EventStoreError> {
        Ok(())
    }
}

/// In-process bus delivering every event to every subscriber
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        tracing::info!(subscriber = subscriber.name(), "Subscriber registered");
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[async_trait]
impl EventDispatcher for EventBus {
    async fn dispatch(&self, events: &[DomainEvent]) -> Result<(), EventStoreError> {
        // Snapshot the list so a subscriber can save (and dispatch) in turn
        let subscribers = self.subscribers.read().await.clone();

        for event in events {
            for subscriber in &subscribers {
                subscriber.handle(event).await.map_err(|e| {
                    tracing::error!(
                        subscriber = subscriber.name(),
                        event_type = %event.event_type(),
                        aggregate_id = %event.aggregate_id(),
                        error = %e,
                        "Subscriber failed"
                    );
                    EventStoreError::Dispatch(format!("{}: {}", subscriber.name(), e))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, UserEvent};
    use chrono::Utc;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventType>>,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), EventStoreError> {
            self.seen.lock().await.push(event.event_type());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventSubscriber for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<(), EventStoreError> {
            Err(EventStoreError::UnsupportedEventType("boom".to_string()))
        }
    }

    fn deleted() -> DomainEvent {
        UserEvent::UserDeleted {
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_bus_delivers_to_every_subscriber() {
        let bus = EventBus::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        bus.subscribe(first.clone()).await;
        bus.subscribe(second.clone()).await;

        bus.dispatch(&[deleted(), deleted()]).await.unwrap();

        assert_eq!(bus.subscriber_count().await, 2);
        assert_eq!(first.seen.lock().await.len(), 2);
        assert_eq!(
            *second.seen.lock().await,
            vec![EventType::UserDeleted, EventType::UserDeleted]
        );
    }

    #[tokio::test]
    async fn test_subscriber_failure_surfaces_as_dispatch_error() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(Failing)).await;

        let err = bus.dispatch(&[deleted()]).await.unwrap_err();
        assert!(matches!(err, EventStoreError::Dispatch(msg) if msg.starts_with("failing")));
    }

    #[tokio::test]
    async fn test_noop_dispatcher() {
        NoopDispatcher.dispatch(&[deleted()]).await.unwrap();
    }
}

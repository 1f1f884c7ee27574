//! Event records as they go into and come out of the event log.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AggregateType, EventType};

/// Serialized event waiting to be appended; the store assigns its version
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: EventType,
    pub event_data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn aggregate_type(&self) -> AggregateType {
        self.event_type.aggregate_type()
    }
}

/// Stored event from the event log
///
/// `event_type` stays a raw string: the discriminator is only interpreted by
/// the serializer, so that an unknown value surfaces as a precise error.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredEvent {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    pub(crate) fn from_new(aggregate_id: Uuid, version: i64, event: &NewEvent) -> Self {
        Self {
            aggregate_id,
            aggregate_type: event.aggregate_type().as_str().to_string(),
            version,
            event_type: event.event_type.as_str().to_string(),
            event_data: event.event_data.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

/// Text form of a payload field, as the `->>` operator would produce it
pub(crate) fn payload_field_text(event_data: &serde_json::Value, field: &str) -> Option<String> {
    match event_data.get(field)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}

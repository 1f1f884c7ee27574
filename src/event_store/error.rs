//! Event Store Errors
//!
//! Error types for event store, snapshot store and repository operations.

use uuid::Uuid;

use crate::domain::AggregateType;

/// Errors that can occur in the persistence core
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// No serializer registered for the event type, or the stored
    /// discriminator is unknown to this build
    #[error("Unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// An event of another context reached an aggregate during replay
    #[error("Unknown event type {event_type} for {aggregate_type} aggregate")]
    UnknownEventType {
        aggregate_type: AggregateType,
        event_type: String,
    },

    /// Stored payload is tagged with a different event type than its row
    #[error("Event type mismatch: row says {expected}, payload says {found}")]
    EventTypeMismatch { expected: String, found: String },

    /// Snapshot could not be written (always swallowed by the repository)
    #[error("Snapshot write failed for aggregate {aggregate_id} at version {version}: {reason}")]
    SnapshotWrite {
        aggregate_id: Uuid,
        version: i64,
        reason: String,
    },

    /// Snapshot document does not describe the requested aggregate
    #[error("Invalid snapshot for aggregate {aggregate_id}: {reason}")]
    InvalidSnapshot { aggregate_id: Uuid, reason: String },

    /// A subscriber failed while handling committed events
    #[error("Event dispatch failed: {0}")]
    Dispatch(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Check if this error points at a missing registration or a missing
    /// match arm rather than at the data or the database
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            EventStoreError::UnsupportedEventType(_)
                | EventStoreError::UnknownEventType { .. }
                | EventStoreError::EventTypeMismatch { .. }
        )
    }
}

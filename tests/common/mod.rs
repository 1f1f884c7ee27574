//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use tasklane::api::{self, AppState};
use tasklane::dispatch::EventSubscriber;
use tasklane::domain::{AggregateType, DomainEvent, EventType};
use tasklane::event_store::{
    EventStore, EventStoreError, InMemoryEventStore, NewEvent, Persistence, StoredEvent,
};
use tasklane::snapshot::{FrequencySnapshotStrategy, Snapshot, SnapshotStore};

/// In-memory persistence snapshotting every `frequency` versions
pub fn in_memory(frequency: u32) -> Persistence {
    Persistence::in_memory()
        .with_snapshot_strategy(Arc::new(FrequencySnapshotStrategy::new(frequency)))
}

/// Router over in-memory storage, with the user cleanup subscriber wired
pub async fn test_app() -> axum::Router {
    api::app(AppState::wire(in_memory(10)).await)
}

/// Snapshot store whose every call fails
#[derive(Debug, Default)]
pub struct FailingSnapshotStore;

fn unavailable() -> EventStoreError {
    EventStoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn save(&self, _snapshot: Snapshot) -> Result<(), EventStoreError> {
        Err(unavailable())
    }

    async fn load_latest(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: AggregateType,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        Err(unavailable())
    }

    async fn load_by_version(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: AggregateType,
        _version: i64,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        Err(unavailable())
    }

    async fn exists(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: AggregateType,
    ) -> Result<bool, EventStoreError> {
        Err(unavailable())
    }

    async fn get_latest_version(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: AggregateType,
    ) -> Result<Option<i64>, EventStoreError> {
        Err(unavailable())
    }

    async fn remove_all(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: AggregateType,
    ) -> Result<u64, EventStoreError> {
        Err(unavailable())
    }
}

/// Which part of a stream was read: `None` for the whole stream,
/// `Some(from)` for a tail read
pub type StreamRead = (Uuid, Option<i64>);

/// In-memory event store that remembers every stream read
#[derive(Debug, Clone, Default)]
pub struct RecordingEventStore {
    inner: InMemoryEventStore,
    reads: Arc<Mutex<Vec<StreamRead>>>,
}

impl RecordingEventStore {
    pub async fn reads(&self) -> Vec<StreamRead> {
        self.reads.lock().await.clone()
    }

    pub async fn clear_reads(&self) {
        self.reads.lock().await.clear();
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        self.inner.append(aggregate_id, events, expected_version).await
    }

    async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.reads.lock().await.push((aggregate_id, None));
        self.inner.get_events(aggregate_id).await
    }

    async fn get_events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.reads.lock().await.push((aggregate_id, Some(from_version)));
        self.inner.get_events_from_version(aggregate_id, from_version).await
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        self.inner.current_version(aggregate_id).await
    }

    async fn find_aggregate_ids(
        &self,
        event_type: EventType,
        field: &str,
        value: &str,
    ) -> Result<Vec<Uuid>, EventStoreError> {
        self.inner.find_aggregate_ids(event_type, field, value).await
    }
}

/// Subscriber that fails its first event, then hands every event to `inner`
pub struct FailOnceSubscriber {
    inner: Arc<dyn EventSubscriber>,
    failed: AtomicBool,
}

impl FailOnceSubscriber {
    pub fn new(inner: Arc<dyn EventSubscriber>) -> Self {
        Self {
            inner,
            failed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventSubscriber for FailOnceSubscriber {
    fn name(&self) -> &'static str {
        "fail_once"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventStoreError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(EventStoreError::Dispatch("subscriber unavailable".to_string()));
        }
        self.inner.handle(event).await
    }
}

/// Setup test database - apply the schema and truncate the tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let schema = include_str!("../../migrations/0001_event_store.sql");
    for statement in schema.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to apply schema");
    }

    sqlx::query("TRUNCATE TABLE events, snapshots")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

//! Integration tests for the event log and snapshot stores
//!
//! Every scenario runs against the in-memory stores; the PostgreSQL variants
//! need `DATABASE_URL` and are ignored by default.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use tasklane::domain::{AggregateType, DomainEvent, EventType, ProjectEvent};
use tasklane::event_store::{
    CompositeEventSerializer, EventStore, InMemoryEventStore, NewEvent, PgEventStore,
};
use tasklane::snapshot::{InMemorySnapshotStore, PgSnapshotStore, Snapshot, SnapshotStore};

mod common;

fn encode(event: ProjectEvent) -> NewEvent {
    CompositeEventSerializer::with_default_contexts()
        .encode(&DomainEvent::from(event))
        .unwrap()
}

fn created(project_id: Uuid, owner_id: Uuid) -> NewEvent {
    encode(ProjectEvent::ProjectCreated {
        project_id,
        name: "Roadmap".to_string(),
        description: None,
        owner_id,
        created_at: Utc::now(),
    })
}

fn renamed(project_id: Uuid, name: &str) -> NewEvent {
    encode(ProjectEvent::ProjectRenamed {
        project_id,
        name: name.to_string(),
        renamed_at: Utc::now(),
    })
}

fn worker_added(project_id: Uuid, worker_id: Uuid) -> NewEvent {
    encode(ProjectEvent::WorkerAdded {
        project_id,
        worker_id,
        added_at: Utc::now(),
    })
}

// =========================================================================
// Event store scenarios
// =========================================================================

async fn append_and_read_back(store: &dyn EventStore) {
    let project_id = Uuid::new_v4();

    store
        .append(project_id, vec![created(project_id, Uuid::new_v4())], 0)
        .await
        .unwrap();
    store
        .append(
            project_id,
            vec![renamed(project_id, "Q3 Roadmap"), renamed(project_id, "Q4 Roadmap")],
            1,
        )
        .await
        .unwrap();

    let events = store.get_events(project_id).await.unwrap();
    let versions: Vec<i64> = events.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(events[0].event_type, "project.created");
    assert_eq!(events[0].aggregate_type, "project");
    assert_eq!(events[2].event_data["name"], json!("Q4 Roadmap"));

    let tail = store.get_events_from_version(project_id, 2).await.unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].version, 2);

    assert_eq!(store.current_version(project_id).await.unwrap(), 3);
    assert_eq!(store.current_version(Uuid::new_v4()).await.unwrap(), 0);
    assert!(store.get_events(Uuid::new_v4()).await.unwrap().is_empty());
}

async fn stale_append_leaves_stream_unchanged(store: &dyn EventStore) {
    let project_id = Uuid::new_v4();
    store
        .append(
            project_id,
            vec![
                created(project_id, Uuid::new_v4()),
                renamed(project_id, "A"),
                renamed(project_id, "B"),
            ],
            0,
        )
        .await
        .unwrap();

    let err = store
        .append(project_id, vec![renamed(project_id, "C")], 0)
        .await
        .unwrap_err();
    assert!(err.is_concurrency_conflict(), "unexpected error: {err}");

    let events = store.get_events(project_id).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].event_data["name"], json!("B"));
}

async fn concurrent_appends_have_one_winner(store: &dyn EventStore) {
    let project_id = Uuid::new_v4();
    store
        .append(project_id, vec![created(project_id, Uuid::new_v4())], 0)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        store.append(project_id, vec![renamed(project_id, "left")], 1),
        store.append(project_id, vec![renamed(project_id, "right")], 1),
    );

    assert!(
        first.is_ok() ^ second.is_ok(),
        "exactly one append must win: {first:?} / {second:?}"
    );
    let loser = first.err().or(second.err()).unwrap();
    assert!(loser.is_concurrency_conflict());
    assert_eq!(store.current_version(project_id).await.unwrap(), 2);
}

async fn find_by_payload_field(store: &dyn EventStore) {
    let owner = Uuid::new_v4();
    let worker = Uuid::new_v4();
    let owned = Uuid::new_v4();
    let staffed = Uuid::new_v4();

    store.append(owned, vec![created(owned, owner)], 0).await.unwrap();
    store
        .append(
            staffed,
            vec![created(staffed, Uuid::new_v4()), worker_added(staffed, worker)],
            0,
        )
        .await
        .unwrap();

    let found = store
        .find_aggregate_ids(EventType::ProjectCreated, "owner_id", &owner.to_string())
        .await
        .unwrap();
    assert_eq!(found, vec![owned]);

    let found = store
        .find_aggregate_ids(EventType::ProjectWorkerAdded, "worker_id", &worker.to_string())
        .await
        .unwrap();
    assert_eq!(found, vec![staffed]);

    let found = store
        .find_aggregate_ids(EventType::ProjectWorkerAdded, "worker_id", &owner.to_string())
        .await
        .unwrap();
    assert!(found.is_empty());
}

// =========================================================================
// Snapshot store scenarios
// =========================================================================

fn snapshot(aggregate_id: Uuid, version: i64, name: &str) -> Snapshot {
    Snapshot {
        aggregate_id,
        aggregate_type: AggregateType::Project,
        version,
        data: json!({ "id": aggregate_id, "name": name }),
        created_at: Utc::now(),
    }
}

async fn snapshot_lifecycle(store: &dyn SnapshotStore) {
    let id = Uuid::new_v4();
    let kind = AggregateType::Project;

    assert!(store.load_latest(id, kind).await.unwrap().is_none());
    assert!(!store.exists(id, kind).await.unwrap());
    assert_eq!(store.get_latest_version(id, kind).await.unwrap(), None);

    store.save(snapshot(id, 10, "ten")).await.unwrap();
    store.save(snapshot(id, 20, "twenty")).await.unwrap();
    // Saving the same version again replaces it
    store.save(snapshot(id, 10, "ten again")).await.unwrap();

    let latest = store.load_latest(id, kind).await.unwrap().unwrap();
    assert_eq!(latest.version, 20);
    assert_eq!(latest.data["name"], json!("twenty"));

    let older = store.load_by_version(id, kind, 10).await.unwrap().unwrap();
    assert_eq!(older.data["name"], json!("ten again"));
    assert!(store.load_by_version(id, kind, 15).await.unwrap().is_none());

    // Same id under another aggregate type is a separate stream
    assert!(!store.exists(id, AggregateType::Order).await.unwrap());

    assert!(store.exists(id, kind).await.unwrap());
    assert_eq!(store.get_latest_version(id, kind).await.unwrap(), Some(20));

    assert_eq!(store.remove_all(id, kind).await.unwrap(), 2);
    assert!(!store.exists(id, kind).await.unwrap());
    assert_eq!(store.remove_all(id, kind).await.unwrap(), 0);
}

// =========================================================================
// In-memory
// =========================================================================

#[tokio::test]
async fn test_memory_append_and_read_back() {
    append_and_read_back(&InMemoryEventStore::new()).await;
}

#[tokio::test]
async fn test_memory_stale_append_leaves_stream_unchanged() {
    stale_append_leaves_stream_unchanged(&InMemoryEventStore::new()).await;
}

#[tokio::test]
async fn test_memory_concurrent_appends_have_one_winner() {
    concurrent_appends_have_one_winner(&InMemoryEventStore::new()).await;
}

#[tokio::test]
async fn test_memory_find_by_payload_field() {
    find_by_payload_field(&InMemoryEventStore::new()).await;
}

#[tokio::test]
async fn test_memory_snapshot_lifecycle() {
    snapshot_lifecycle(&InMemorySnapshotStore::new()).await;
}

// =========================================================================
// PostgreSQL
// =========================================================================

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_append_and_read_back() {
    let pool = common::setup_test_db().await;
    append_and_read_back(&PgEventStore::new(pool)).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_stale_append_leaves_stream_unchanged() {
    let pool = common::setup_test_db().await;
    stale_append_leaves_stream_unchanged(&PgEventStore::new(pool)).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_concurrent_appends_have_one_winner() {
    let pool = common::setup_test_db().await;
    concurrent_appends_have_one_winner(&PgEventStore::new(pool)).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_find_by_payload_field() {
    let pool = common::setup_test_db().await;
    find_by_payload_field(&PgEventStore::new(pool)).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_snapshot_lifecycle() {
    let pool = common::setup_test_db().await;
    snapshot_lifecycle(&PgSnapshotStore::new(pool)).await;
}

//! Repository and handler tests over the in-memory stores

use std::sync::Arc;

use rust_decimal_macros::dec;
use uuid::Uuid;

use tasklane::aggregate::{Aggregate, Order, OrderStatus, Project, User};
use tasklane::api::AppState;
use tasklane::domain::{AggregateType, DomainError, OrderItem};
use tasklane::dispatch::{EventBus, UserCleanupSubscriber};
use tasklane::event_store::{EventStore, EventStoreError, EventStoreRepository, Persistence};
use tasklane::handlers::{
    CreateOrderCommand, CreateProjectCommand, CreateUserCommand, OrderHandler, ProjectHandler,
    UpdateProjectCommand, UserHandler,
};
use tasklane::snapshot::{
    FrequencySnapshotStrategy, InMemorySnapshotStore, NeverSnapshot, Snapshotable,
};
use tasklane::AppError;

mod common;

/// Repository over the same event log but without any snapshot
fn replay_only<A: Snapshotable>(persistence: &Persistence) -> EventStoreRepository<A> {
    let persistence = Persistence::new(
        persistence.event_store().clone(),
        Arc::new(InMemorySnapshotStore::new()),
    )
    .with_snapshot_strategy(Arc::new(NeverSnapshot));
    EventStoreRepository::new(persistence)
}

async fn create_user(users: &UserHandler, username: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    users
        .create(CreateUserCommand::new(
            user_id,
            username.to_string(),
            format!("{username}@example.com"),
        ))
        .await
        .unwrap();
    user_id
}

// =========================================================================
// Snapshots
// =========================================================================

#[tokio::test]
async fn test_snapshots_follow_frequency_and_match_replay() {
    let store = common::RecordingEventStore::default();
    let persistence = Persistence::new(
        Arc::new(store.clone()),
        Arc::new(InMemorySnapshotStore::new()),
    )
    .with_snapshot_strategy(Arc::new(FrequencySnapshotStrategy::new(2)));
    let repository = EventStoreRepository::<Project>::new(persistence.clone());
    let project_id = Uuid::new_v4();
    let worker = Uuid::new_v4();

    let mut project =
        Project::create(project_id, "Roadmap".to_string(), None, Uuid::new_v4()).unwrap();
    repository.save(&mut project).await.unwrap();

    project.add_worker(worker).unwrap();
    repository.save(&mut project).await.unwrap();

    project.rename("Roadmap v2".to_string()).unwrap();
    repository.save(&mut project).await.unwrap();

    project.remove_worker(worker).unwrap();
    repository.save(&mut project).await.unwrap();

    let snapshots = persistence.snapshot_store();
    for version in [2, 4] {
        assert!(
            snapshots
                .load_by_version(project_id, AggregateType::Project, version)
                .await
                .unwrap()
                .is_some(),
            "missing snapshot at version {version}"
        );
    }
    for version in [1, 3] {
        assert!(snapshots
            .load_by_version(project_id, AggregateType::Project, version)
            .await
            .unwrap()
            .is_none());
    }
    assert_eq!(
        snapshots
            .get_latest_version(project_id, AggregateType::Project)
            .await
            .unwrap(),
        Some(4)
    );

    store.clear_reads().await;
    let from_snapshot = repository.load(project_id).await.unwrap().unwrap();

    // Version 4 is snapshotted, so only the empty tail after it is read
    assert_eq!(store.reads().await, vec![(project_id, Some(5))]);
    assert!(store
        .get_events_from_version(project_id, 5)
        .await
        .unwrap()
        .is_empty());

    let from_replay = replay_only::<Project>(&persistence)
        .load(project_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(from_snapshot, from_replay);
    assert_eq!(from_snapshot, project);
    assert_eq!(from_snapshot.version(), 4);
    assert_eq!(from_snapshot.name(), "Roadmap v2");
    assert!(from_snapshot.workers().is_empty());
}

#[tokio::test]
async fn test_events_after_snapshot_are_replayed() {
    let persistence = common::in_memory(2);
    let repository = EventStoreRepository::<Project>::new(persistence.clone());
    let project_id = Uuid::new_v4();

    let mut project =
        Project::create(project_id, "Roadmap".to_string(), None, Uuid::new_v4()).unwrap();
    project.rename("Roadmap v2".to_string()).unwrap();
    repository.save(&mut project).await.unwrap();

    project.rename("Roadmap v3".to_string()).unwrap();
    repository.save(&mut project).await.unwrap();

    let loaded = repository.load(project_id).await.unwrap().unwrap();
    assert_eq!(loaded.version(), 3);
    assert_eq!(loaded.name(), "Roadmap v3");
    assert_eq!(
        persistence
            .snapshot_store()
            .get_latest_version(project_id, AggregateType::Project)
            .await
            .unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_snapshot_store_failure_does_not_fail_commands() {
    let persistence =
        common::in_memory(1).with_snapshot_store(Arc::new(common::FailingSnapshotStore));
    let orders = EventStoreRepository::<Order>::new(persistence);
    let order_id = Uuid::new_v4();

    let mut order = Order::create(order_id, Uuid::new_v4());
    repository_save_items(&orders, &mut order).await;

    let loaded = orders.load(order_id).await.unwrap().unwrap();
    assert_eq!(loaded, order);
    assert_eq!(loaded.total(), dec!(25.00));
    assert!(orders.exists(order_id).await.unwrap());
}

async fn repository_save_items(orders: &EventStoreRepository<Order>, order: &mut Order) {
    orders.save(order).await.unwrap();
    order
        .add_item(OrderItem::new("sku-1", 2, dec!(10.00)))
        .unwrap();
    orders.save(order).await.unwrap();
    order
        .add_item(OrderItem::new("sku-2", 1, dec!(5.00)))
        .unwrap();
    orders.save(order).await.unwrap();
}

#[tokio::test]
async fn test_never_snapshot_loads_the_same_state() {
    let with_snapshots = common::in_memory(1);
    let without = with_snapshots
        .clone()
        .with_snapshot_strategy(Arc::new(NeverSnapshot));

    let user_id = Uuid::new_v4();
    let mut user = User::create(
        user_id,
        "ada".to_string(),
        "ada@example.com".to_string(),
        None,
    )
    .unwrap();
    EventStoreRepository::<User>::new(with_snapshots.clone())
        .save(&mut user)
        .await
        .unwrap();

    let a = EventStoreRepository::<User>::new(with_snapshots)
        .load(user_id)
        .await
        .unwrap();
    let b = replay_only::<User>(&without).load(user_id).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.unwrap().username(), "ada");
}

// =========================================================================
// Soft delete
// =========================================================================

#[tokio::test]
async fn test_deleted_project_is_hidden_but_kept() {
    let persistence = common::in_memory(10);
    let users = UserHandler::new(persistence.clone());
    let projects = ProjectHandler::new(persistence.clone());

    let owner = create_user(&users, "owner").await;
    let project_id = Uuid::new_v4();
    projects
        .create(CreateProjectCommand::new(project_id, "Roadmap".to_string(), owner))
        .await
        .unwrap();

    projects.delete(project_id).await.unwrap();

    let err = projects.get(project_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { resource: "project", .. }));

    let err = projects.delete(project_id).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::AlreadyDeleted { .. })));

    let err = projects
        .update(UpdateProjectCommand::new(project_id).rename("Revived".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let stored = EventStoreRepository::<Project>::new(persistence)
        .load(project_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_deleted());
    assert_eq!(stored.version(), 2);
}

#[tokio::test]
async fn test_deleted_order_is_hidden_but_kept() {
    let persistence = common::in_memory(10);
    let users = UserHandler::new(persistence.clone());
    let orders = OrderHandler::new(persistence.clone());

    let customer = create_user(&users, "customer").await;
    let order_id = Uuid::new_v4();
    orders
        .create(CreateOrderCommand::new(order_id, customer).with_item("sku-1", 1, dec!(3.50)))
        .await
        .unwrap();

    orders.delete(order_id).await.unwrap();

    assert!(matches!(
        orders.get(order_id).await.unwrap_err(),
        AppError::NotFound { resource: "order", .. }
    ));
    assert!(matches!(
        orders.delete(order_id).await.unwrap_err(),
        AppError::Domain(DomainError::AlreadyDeleted { .. })
    ));

    let stored = EventStoreRepository::<Order>::new(persistence)
        .load(order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_deleted());
    assert_eq!(stored.status(), OrderStatus::Pending);
}

#[tokio::test]
async fn test_deleting_user_twice_is_a_noop() {
    let persistence = common::in_memory(10);
    let users = UserHandler::new(persistence.clone());

    let user_id = create_user(&users, "grace").await;
    users.delete(user_id).await.unwrap();
    users.delete(user_id).await.unwrap();

    assert!(matches!(
        users.get(user_id).await.unwrap_err(),
        AppError::NotFound { resource: "user", .. }
    ));
    assert_eq!(
        persistence.event_store().current_version(user_id).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_create_with_taken_id_is_rejected() {
    let users = UserHandler::new(common::in_memory(10));
    let user_id = create_user(&users, "first").await;

    let err = users
        .create(CreateUserCommand::new(
            user_id,
            "second".to_string(),
            "second@example.com".to_string(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists { .. }));
}

// =========================================================================
// Cleanup on user deletion
// =========================================================================

#[tokio::test]
async fn test_deleting_user_detaches_projects() {
    let state = AppState::wire(common::in_memory(10)).await;

    let alice = create_user(&state.users, "alice").await;
    let bob = create_user(&state.users, "bob").await;

    let alices_project = Uuid::new_v4();
    state
        .projects
        .create(CreateProjectCommand::new(alices_project, "Alice's".to_string(), alice))
        .await
        .unwrap();
    state.projects.add_worker(alices_project, bob).await.unwrap();

    let bobs_project = Uuid::new_v4();
    state
        .projects
        .create(CreateProjectCommand::new(bobs_project, "Bob's".to_string(), bob))
        .await
        .unwrap();
    state.projects.add_worker(bobs_project, alice).await.unwrap();

    assert_eq!(state.projects.list_for_user(bob).await.unwrap().len(), 2);

    state.users.delete(alice).await.unwrap();

    assert!(matches!(
        state.projects.get(alices_project).await.unwrap_err(),
        AppError::NotFound { .. }
    ));

    let remaining = state.projects.get(bobs_project).await.unwrap();
    assert!(!remaining.has_worker(alice));

    let listed = state.projects.list_for_user(bob).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![bobs_project]);

    // Deleted users cannot be assigned again
    let err = state.projects.add_worker(bobs_project, alice).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { resource: "user", .. }));
}

#[tokio::test]
async fn test_failed_cleanup_runs_again_when_delete_is_retried() {
    let bus = EventBus::new();
    let persistence = common::in_memory(10).with_dispatcher(Arc::new(bus.clone()));
    let users = UserHandler::new(persistence.clone());
    let projects = ProjectHandler::new(persistence);

    let owner = create_user(&users, "owner").await;
    let project_id = Uuid::new_v4();
    projects
        .create(CreateProjectCommand::new(project_id, "Roadmap".to_string(), owner))
        .await
        .unwrap();

    let cleanup = Arc::new(UserCleanupSubscriber::new(projects.clone()));
    bus.subscribe(Arc::new(common::FailOnceSubscriber::new(cleanup)))
        .await;

    // The delete is committed but its cleanup fails
    let err = users.delete(owner).await.unwrap_err();
    assert!(matches!(err, AppError::Store(EventStoreError::Dispatch(_))));
    assert!(matches!(
        users.get(owner).await.unwrap_err(),
        AppError::NotFound { resource: "user", .. }
    ));
    assert!(projects.get(project_id).await.is_ok());

    // Retrying the delete runs the cleanup again
    users.delete(owner).await.unwrap();
    assert!(matches!(
        projects.get(project_id).await.unwrap_err(),
        AppError::NotFound { resource: "project", .. }
    ));
}

//! Command Handlers module
//!
//! Handlers load an aggregate, run one business method and save it. A
//! concurrency conflict reloads and retries the whole command a bounded
//! number of times; every other error is returned as is.

mod commands;
mod order_handler;
mod project_handler;
mod user_handler;

pub use commands::*;
pub use order_handler::OrderHandler;
pub use project_handler::ProjectHandler;
pub use user_handler::UserHandler;

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, Project, User};
use crate::domain::DomainError;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStoreRepository;

/// Attempts per command, the first one included
pub const MAX_ATTEMPTS: u32 = 3;

const BACKOFF_STEP_MS: u64 = 50;

/// Run `command`, retrying on concurrency conflicts with linear backoff
pub async fn retry_on_conflict<T, F, Fut>(operation: &'static str, mut command: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match command().await {
            Err(e) if e.is_concurrency_conflict() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    operation,
                    "Concurrency conflict, retrying (attempt {}/{})",
                    attempt,
                    MAX_ATTEMPTS
                );
                tokio::time::sleep(Duration::from_millis(BACKOFF_STEP_MS * u64::from(attempt)))
                    .await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

// =========================================================================
// Loading helpers
// =========================================================================

/// Aggregate exposed as an API resource
pub(crate) trait Resource: Aggregate {
    /// Name used in not-found errors
    const NAME: &'static str;

    fn is_deleted(&self) -> bool;
}

impl Resource for Project {
    const NAME: &'static str = "project";

    fn is_deleted(&self) -> bool {
        Project::is_deleted(self)
    }
}

impl Resource for Order {
    const NAME: &'static str = "order";

    fn is_deleted(&self) -> bool {
        Order::is_deleted(self)
    }
}

impl Resource for User {
    const NAME: &'static str = "user";

    fn is_deleted(&self) -> bool {
        User::is_deleted(self)
    }
}

/// Which aggregates a command may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Soft deleted aggregates are reported as not found
    Live,
    /// Soft deleted aggregates are loaded too (delete commands)
    IncludingDeleted,
}

pub(crate) async fn load<A: Resource>(
    repository: &EventStoreRepository<A>,
    id: Uuid,
    scope: Scope,
) -> AppResult<A> {
    match repository.load(id).await? {
        Some(aggregate) if scope == Scope::IncludingDeleted || !aggregate.is_deleted() => {
            Ok(aggregate)
        }
        _ => Err(AppError::not_found(A::NAME, id)),
    }
}

/// Load, change and save one aggregate, retrying on conflicts.
///
/// `change` runs again on a fresh copy for every attempt.
pub(crate) async fn modify<A, F>(
    repository: &EventStoreRepository<A>,
    id: Uuid,
    scope: Scope,
    operation: &'static str,
    change: F,
) -> AppResult<A>
where
    A: Resource,
    F: Fn(&mut A) -> Result<(), DomainError> + Send + Sync,
{
    let change = &change;
    retry_on_conflict(operation, move || async move {
        let mut aggregate = load(repository, id, scope).await?;
        change(&mut aggregate)?;
        repository.save(&mut aggregate).await?;
        Ok(aggregate)
    })
    .await
}

/// Fail unless `user_id` names a live user
pub(crate) async fn require_user(users: &EventStoreRepository<User>, user_id: Uuid) -> AppResult<User> {
    load(users, user_id, Scope::Live).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::EventStoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> AppError {
        AppError::Store(EventStoreError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        })
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_on_conflict("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: AppResult<()> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;

        assert!(result.unwrap_err().is_concurrency_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: AppResult<()> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::InvalidRequest("bad".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! User Handler
//!
//! Creates, updates and deletes users. Deleting a user dispatches
//! `user.deleted`, which the cleanup subscriber turns into project changes.

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::dispatch::EventDispatcher;
use crate::domain::{DomainEvent, UserEvent};
use crate::error::{AppError, AppResult};
use crate::event_store::{EventStoreRepository, Persistence};

use super::{load, modify, CreateUserCommand, Scope, UpdateUserCommand};

/// Handler for user commands
#[derive(Clone)]
pub struct UserHandler {
    users: EventStoreRepository<User>,
}

impl UserHandler {
    pub fn new(persistence: Persistence) -> Self {
        Self {
            users: EventStoreRepository::new(persistence),
        }
    }

    /// Execute the create user command
    pub async fn create(&self, command: CreateUserCommand) -> AppResult<User> {
        if self.users.exists(command.user_id).await? {
            return Err(AppError::already_exists("user", command.user_id));
        }

        let mut user = User::create(
            command.user_id,
            command.username,
            command.email,
            command.display_name,
        )?;

        self.users.save(&mut user).await.map_err(|e| {
            // Lost the race against another create with the same id
            if e.is_concurrency_conflict() {
                AppError::already_exists("user", command.user_id)
            } else {
                e.into()
            }
        })?;

        tracing::info!(user_id = %command.user_id, username = %user.username(), "User created");

        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<User> {
        load(&self.users, user_id, Scope::Live).await
    }

    pub async fn update(&self, command: UpdateUserCommand) -> AppResult<User> {
        modify(&self.users, command.user_id, Scope::Live, "update_user", |user| {
            user.update(command.changes.clone())
        })
        .await
    }

    /// Soft delete. Deleting a deleted user records no new event but hands
    /// `user.deleted` to the dispatcher again, so a cleanup that failed after
    /// the first commit runs again on retry.
    pub async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        let already_deleted = AtomicBool::new(false);
        let user = modify(&self.users, user_id, Scope::IncludingDeleted, "delete_user", |user| {
            already_deleted.store(user.is_deleted(), Ordering::Relaxed);
            user.delete();
            Ok(())
        })
        .await?;

        if already_deleted.load(Ordering::Relaxed) {
            if let Some(deleted_at) = user.deleted_at() {
                let event = DomainEvent::User(UserEvent::UserDeleted {
                    user_id,
                    deleted_at,
                });
                self.users.persistence().dispatcher().dispatch(&[event]).await?;
            }
            tracing::info!(user_id = %user_id, "User already deleted, cleanup dispatched again");
            return Ok(());
        }

        tracing::info!(user_id = %user_id, version = user.version(), "User deleted");

        Ok(())
    }
}

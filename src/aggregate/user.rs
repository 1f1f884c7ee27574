//! User Aggregate
//!
//! User aggregate for managing user profile information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, UserChanges, UserEvent};
use crate::snapshot::Snapshotable;

use super::{Aggregate, AggregateRoot};

/// User Aggregate
///
/// Represents a user in the system. Authentication is out of scope; this is
/// profile data only.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Unique user ID
    id: Uuid,

    username: String,

    email: String,

    display_name: Option<String>,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,

    /// Set once the user is deleted (soft delete)
    deleted_at: Option<DateTime<Utc>>,

    root: AggregateRoot<UserEvent>,
}

/// Snapshot document of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user and record the creation event
    pub fn create(
        user_id: Uuid,
        username: String,
        email: String,
        display_name: Option<String>,
    ) -> Result<Self, DomainError> {
        if username.trim().is_empty() {
            return Err(DomainError::validation("username must not be blank"));
        }
        validate_email(&email)?;

        let mut user = Self::blank(user_id);
        user.record_new(UserEvent::UserCreated {
            user_id,
            username,
            email,
            display_name,
            created_at: Utc::now(),
        });

        Ok(user)
    }

    /// Update user profile
    pub fn update(&mut self, changes: UserChanges) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::Deleted {
                aggregate_type: AggregateType::User,
                id: self.id,
            });
        }

        if changes.is_empty() {
            return Err(DomainError::NoChanges);
        }
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }

        self.record_new(UserEvent::UserUpdated {
            user_id: self.id,
            changes,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    /// Soft delete. Deleting an already deleted user is a no-op.
    pub fn delete(&mut self) {
        if self.is_deleted() {
            return;
        }

        self.record_new(UserEvent::UserDeleted {
            user_id: self.id,
            deleted_at: Utc::now(),
        });
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation(format!("invalid email: {}", email))),
    }
}

impl Aggregate for User {
    type Event = UserEvent;

    fn blank(id: Uuid) -> Self {
        Self {
            id,
            username: String::new(),
            email: String::new(),
            display_name: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            root: AggregateRoot::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn root(&self) -> &AggregateRoot<UserEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<UserEvent> {
        &mut self.root
    }

    fn handle_event(&mut self, event: &UserEvent) {
        match event {
            UserEvent::UserCreated {
                user_id,
                username,
                email,
                display_name,
                created_at,
            } => {
                self.id = *user_id;
                self.username = username.clone();
                self.email = email.clone();
                self.display_name = display_name.clone();
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
            }

            UserEvent::UserUpdated {
                changes, updated_at, ..
            } => {
                if let Some(display_name) = &changes.display_name {
                    self.display_name = Some(display_name.clone());
                }
                if let Some(email) = &changes.email {
                    self.email = email.clone();
                }
                self.updated_at = Some(*updated_at);
            }

            UserEvent::UserDeleted { deleted_at, .. } => {
                self.deleted_at = Some(*deleted_at);
                self.updated_at = Some(*deleted_at);
            }
        }
    }
}

impl Snapshotable for User {
    type State = UserState;

    fn to_state(&self) -> UserState {
        UserState {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }

    fn from_state(state: UserState, version: i64) -> Self {
        Self {
            id: state.id,
            username: state.username,
            email: state.email,
            display_name: state.display_name,
            created_at: state.created_at,
            updated_at: state.updated_at,
            deleted_at: state.deleted_at,
            root: AggregateRoot::restored(version),
        }
    }
}

//! Cross-aggregate cleanup after a user is deleted.

use async_trait::async_trait;

use crate::domain::{DomainEvent, UserEvent};
use crate::event_store::EventStoreError;
use crate::handlers::ProjectHandler;

use super::EventSubscriber;

/// On `user.deleted`: deletes the user's projects and removes the user
/// from every project they work on
#[derive(Clone)]
pub struct UserCleanupSubscriber {
    projects: ProjectHandler,
}

impl UserCleanupSubscriber {
    pub fn new(projects: ProjectHandler) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl EventSubscriber for UserCleanupSubscriber {
    fn name(&self) -> &'static str {
        "user_cleanup"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventStoreError> {
        let DomainEvent::User(UserEvent::UserDeleted { user_id, .. }) = event else {
            return Ok(());
        };

        self.projects
            .detach_user(*user_id)
            .await
            .map_err(|e| EventStoreError::Dispatch(e.to_string()))
    }
}

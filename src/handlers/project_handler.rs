//! Project Handler
//!
//! Project commands plus the cleanup applied when a user goes away.
//! Owners and workers must be live users when they are assigned.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Project, User};
use crate::domain::{DomainError, EventType};
use crate::error::{AppError, AppResult};
use crate::event_store::{EventStoreRepository, Persistence};

use super::{load, modify, require_user, CreateProjectCommand, Scope, UpdateProjectCommand};

/// Handler for project commands
#[derive(Clone)]
pub struct ProjectHandler {
    projects: EventStoreRepository<Project>,
    users: EventStoreRepository<User>,
}

impl ProjectHandler {
    pub fn new(persistence: Persistence) -> Self {
        Self {
            projects: EventStoreRepository::new(persistence.clone()),
            users: EventStoreRepository::new(persistence),
        }
    }

    /// Execute the create project command
    pub async fn create(&self, command: CreateProjectCommand) -> AppResult<Project> {
        require_user(&self.users, command.owner_id).await?;

        if self.projects.exists(command.project_id).await? {
            return Err(AppError::already_exists("project", command.project_id));
        }

        let mut project = Project::create(
            command.project_id,
            command.name,
            command.description,
            command.owner_id,
        )?;

        self.projects.save(&mut project).await.map_err(|e| {
            if e.is_concurrency_conflict() {
                AppError::already_exists("project", command.project_id)
            } else {
                e.into()
            }
        })?;

        tracing::info!(
            project_id = %command.project_id,
            owner_id = %command.owner_id,
            "Project created"
        );

        Ok(project)
    }

    pub async fn get(&self, project_id: Uuid) -> AppResult<Project> {
        load(&self.projects, project_id, Scope::Live).await
    }

    /// Rename and/or change the description in one save
    pub async fn update(&self, command: UpdateProjectCommand) -> AppResult<Project> {
        if command.is_empty() {
            return Err(DomainError::NoChanges.into());
        }

        modify(&self.projects, command.project_id, Scope::Live, "update_project", |project| {
            if let Some(name) = &command.name {
                project.rename(name.clone())?;
            }
            if let Some(description) = &command.description {
                project.change_description(description.clone())?;
            }
            Ok(())
        })
        .await
    }

    pub async fn add_worker(&self, project_id: Uuid, worker_id: Uuid) -> AppResult<Project> {
        require_user(&self.users, worker_id).await?;

        modify(&self.projects, project_id, Scope::Live, "add_worker", |project| {
            project.add_worker(worker_id)
        })
        .await
    }

    pub async fn remove_worker(&self, project_id: Uuid, worker_id: Uuid) -> AppResult<Project> {
        modify(&self.projects, project_id, Scope::Live, "remove_worker", |project| {
            project.remove_worker(worker_id)
        })
        .await
    }

    /// Soft delete. Deleting a deleted project is `AlreadyDeleted`.
    pub async fn delete(&self, project_id: Uuid) -> AppResult<()> {
        modify(&self.projects, project_id, Scope::IncludingDeleted, "delete_project", |project| {
            project.delete()
        })
        .await?;

        tracing::info!(project_id = %project_id, "Project deleted");

        Ok(())
    }

    /// Live projects the user owns or works on
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Project>> {
        require_user(&self.users, user_id).await?;

        let (owned, worked) = self.related_projects(user_id).await?;
        let mut projects = Vec::new();
        for project_id in owned.union(&worked) {
            if let Some(project) = self.projects.load(*project_id).await? {
                let related = project.owner_id() == user_id || project.has_worker(user_id);
                if related && !project.is_deleted() {
                    projects.push(project);
                }
            }
        }

        projects.sort_by_key(|project| (project.created_at(), project.id()));
        Ok(projects)
    }

    /// Delete the live projects a user owns and unassign the user from every
    /// other project
    pub async fn detach_user(&self, user_id: Uuid) -> AppResult<()> {
        let (owned, worked) = self.related_projects(user_id).await?;

        for project_id in &owned {
            modify(
                &self.projects,
                *project_id,
                Scope::IncludingDeleted,
                "delete_owned_project",
                |project| {
                    if project.is_deleted() {
                        return Ok(());
                    }
                    project.delete()
                },
            )
            .await?;
        }

        for project_id in worked.difference(&owned) {
            modify(
                &self.projects,
                *project_id,
                Scope::IncludingDeleted,
                "unassign_deleted_user",
                |project| {
                    if project.is_deleted() || !project.has_worker(user_id) {
                        return Ok(());
                    }
                    project.remove_worker(user_id)
                },
            )
            .await?;
        }

        tracing::info!(
            user_id = %user_id,
            owned = owned.len(),
            worked = worked.len(),
            "Detached user from projects"
        );

        Ok(())
    }

    /// Ids of projects created by the user, and of projects the user was ever
    /// assigned to
    async fn related_projects(&self, user_id: Uuid) -> AppResult<(BTreeSet<Uuid>, BTreeSet<Uuid>)> {
        let event_store = self.projects.persistence().event_store();
        let user = user_id.to_string();

        let owned = event_store
            .find_aggregate_ids(EventType::ProjectCreated, "owner_id", &user)
            .await?;
        let worked = event_store
            .find_aggregate_ids(EventType::ProjectWorkerAdded, "worker_id", &user)
            .await?;

        Ok((owned.into_iter().collect(), worked.into_iter().collect()))
    }
}

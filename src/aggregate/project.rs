//! Project Aggregate
//!
//! A project has an owner and an ordered list of workers (user ids).
//! Deleting a project is a soft delete: the aggregate keeps its history and
//! refuses any further change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, ProjectEvent};
use crate::snapshot::Snapshotable;

use super::{Aggregate, AggregateRoot};

const MAX_NAME_LEN: usize = 200;

/// Project Aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    id: Uuid,
    name: String,
    description: Option<String>,
    owner_id: Uuid,
    /// Assigned users, in assignment order
    workers: Vec<Uuid>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    root: AggregateRoot<ProjectEvent>,
}

/// Snapshot document of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub workers: Vec<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a new project and record the creation event
    pub fn create(
        project_id: Uuid,
        name: String,
        description: Option<String>,
        owner_id: Uuid,
    ) -> Result<Self, DomainError> {
        validate_name(&name)?;

        let mut project = Self::blank(project_id);
        project.record_new(ProjectEvent::ProjectCreated {
            project_id,
            name,
            description,
            owner_id,
            created_at: Utc::now(),
        });

        Ok(project)
    }

    pub fn rename(&mut self, name: String) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        validate_name(&name)?;
        if name == self.name {
            return Err(DomainError::NameUnchanged);
        }

        self.record_new(ProjectEvent::ProjectRenamed {
            project_id: self.id,
            name,
            renamed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn change_description(&mut self, description: Option<String>) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        if description == self.description {
            return Err(DomainError::NoChanges);
        }

        self.record_new(ProjectEvent::DescriptionChanged {
            project_id: self.id,
            description,
            changed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn add_worker(&mut self, worker_id: Uuid) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        if self.has_worker(worker_id) {
            return Err(DomainError::WorkerAlreadyAssigned {
                project_id: self.id,
                worker_id,
            });
        }

        self.record_new(ProjectEvent::WorkerAdded {
            project_id: self.id,
            worker_id,
            added_at: Utc::now(),
        });
        Ok(())
    }

    pub fn remove_worker(&mut self, worker_id: Uuid) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        if !self.has_worker(worker_id) {
            return Err(DomainError::WorkerNotAssigned {
                project_id: self.id,
                worker_id,
            });
        }

        self.record_new(ProjectEvent::WorkerRemoved {
            project_id: self.id,
            worker_id,
            removed_at: Utc::now(),
        });
        Ok(())
    }

    /// Soft delete. Deleting twice is an error.
    pub fn delete(&mut self) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::AlreadyDeleted {
                aggregate_type: AggregateType::Project,
                id: self.id,
            });
        }

        self.record_new(ProjectEvent::ProjectDeleted {
            project_id: self.id,
            deleted_at: Utc::now(),
        });
        Ok(())
    }

    fn ensure_not_deleted(&self) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::Deleted {
                aggregate_type: AggregateType::Project,
                id: self.id,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn workers(&self) -> &[Uuid] {
        &self.workers
    }

    pub fn has_worker(&self, worker_id: Uuid) -> bool {
        self.workers.contains(&worker_id)
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

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("project name must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "project name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

impl Aggregate for Project {
    type Event = ProjectEvent;

    fn blank(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            owner_id: Uuid::nil(),
            workers: Vec::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            root: AggregateRoot::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn root(&self) -> &AggregateRoot<ProjectEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<ProjectEvent> {
        &mut self.root
    }

    fn handle_event(&mut self, event: &ProjectEvent) {
        match event {
            ProjectEvent::ProjectCreated {
                project_id,
                name,
                description,
                owner_id,
                created_at,
            } => {
                self.id = *project_id;
                self.name = name.clone();
                self.description = description.clone();
                self.owner_id = *owner_id;
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
            }

            ProjectEvent::ProjectRenamed {
                name, renamed_at, ..
            } => {
                self.name = name.clone();
                self.updated_at = Some(*renamed_at);
            }

            ProjectEvent::DescriptionChanged {
                description,
                changed_at,
                ..
            } => {
                self.description = description.clone();
                self.updated_at = Some(*changed_at);
            }

            ProjectEvent::WorkerAdded {
                worker_id,
                added_at,
                ..
            } => {
                self.workers.push(*worker_id);
                self.updated_at = Some(*added_at);
            }

            ProjectEvent::WorkerRemoved {
                worker_id,
                removed_at,
                ..
            } => {
                self.workers.retain(|id| id != worker_id);
                self.updated_at = Some(*removed_at);
            }

            ProjectEvent::ProjectDeleted { deleted_at, .. } => {
                self.deleted_at = Some(*deleted_at);
                self.updated_at = Some(*deleted_at);
            }
        }
    }
}

impl Snapshotable for Project {
    type State = ProjectState;

    fn to_state(&self) -> ProjectState {
        ProjectState {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id,
            workers: self.workers.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }

    fn from_state(state: ProjectState, version: i64) -> Self {
        Self {
            id: state.id,
            name: state.name,
            description: state.description,
            owner_id: state.owner_id,
            workers: state.workers,
            created_at: state.created_at,
            updated_at: state.updated_at,
            deleted_at: state.deleted_at,
            root: AggregateRoot::restored(version),
        }
    }
}

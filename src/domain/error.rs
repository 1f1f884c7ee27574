//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::events::AggregateType;

/// Business rule violations raised by aggregate methods
///
/// These are returned before any event is constructed, so a failed command
/// never reaches the event store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Input failed validation (blank name, malformed email, zero quantity...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The aggregate was soft deleted and refuses further changes
    #[error("{aggregate_type} {id} has been deleted")]
    Deleted { aggregate_type: AggregateType, id: Uuid },

    /// Delete was requested on an aggregate that is already deleted
    #[error("{aggregate_type} {id} is already deleted")]
    AlreadyDeleted { aggregate_type: AggregateType, id: Uuid },

    /// Rename to the current name
    #[error("Name is unchanged")]
    NameUnchanged,

    /// Update without any actual change
    #[error("No changes provided")]
    NoChanges,

    #[error("User {worker_id} already works on project {project_id}")]
    WorkerAlreadyAssigned { project_id: Uuid, worker_id: Uuid },

    #[error("User {worker_id} does not work on project {project_id}")]
    WorkerNotAssigned { project_id: Uuid, worker_id: Uuid },

    #[error("Product {product_id} is not on order {order_id}")]
    ItemNotFound { order_id: Uuid, product_id: String },

    #[error("Cannot confirm order {0} without items")]
    EmptyOrder(Uuid),

    /// Order status does not allow the requested action
    #[error("Cannot {action} an order that is {status}")]
    InvalidTransition { status: String, action: &'static str },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable code used in API error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Deleted { .. } => "deleted",
            Self::AlreadyDeleted { .. } => "already_deleted",
            Self::NameUnchanged => "name_unchanged",
            Self::NoChanges => "no_changes",
            Self::WorkerAlreadyAssigned { .. } => "worker_already_assigned",
            Self::WorkerNotAssigned { .. } => "worker_not_assigned",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::EmptyOrder(_) => "empty_order",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// Check if the input itself was malformed (as opposed to a state conflict)
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NoChanges)
    }
}

//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system.
//!
//! Every event carries a stable discriminator (`EventType`) whose wire form is
//! `<aggregate_type>.<event>`. The discriminator is what gets persisted, never
//! a Rust type or variant name.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a persisted discriminator is not known to this build
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown discriminator: {0}")]
pub struct UnknownDiscriminator(pub String);

// =========================================================================
// Aggregate types
// =========================================================================

/// Kind of aggregate a stream belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Project,
    Order,
    User,
}

impl AggregateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::Project => "project",
            AggregateType::Order => "order",
            AggregateType::User => "user",
        }
    }

    /// Derive the aggregate type from an event discriminator's namespace prefix
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        let (prefix, _) = event_type.split_once('.')?;
        prefix.parse().ok()
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateType {
    type Err = UnknownDiscriminator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(AggregateType::Project),
            "order" => Ok(AggregateType::Order),
            "user" => Ok(AggregateType::User),
            other => Err(UnknownDiscriminator(other.to_string())),
        }
    }
}

// =========================================================================
// Event types
// =========================================================================

/// Closed set of event discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ProjectCreated,
    ProjectRenamed,
    ProjectDescriptionChanged,
    ProjectWorkerAdded,
    ProjectWorkerRemoved,
    ProjectDeleted,
    OrderCreated,
    OrderItemAdded,
    OrderItemRemoved,
    OrderConfirmed,
    OrderShipped,
    OrderCancelled,
    OrderDeleted,
    UserCreated,
    UserUpdated,
    UserDeleted,
}

impl EventType {
    pub const ALL: [EventType; 16] = [
        EventType::ProjectCreated,
        EventType::ProjectRenamed,
        EventType::ProjectDescriptionChanged,
        EventType::ProjectWorkerAdded,
        EventType::ProjectWorkerRemoved,
        EventType::ProjectDeleted,
        EventType::OrderCreated,
        EventType::OrderItemAdded,
        EventType::OrderItemRemoved,
        EventType::OrderConfirmed,
        EventType::OrderShipped,
        EventType::OrderCancelled,
        EventType::OrderDeleted,
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::UserDeleted,
    ];

    /// Wire discriminator stored in the `event_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProjectCreated => "project.created",
            EventType::ProjectRenamed => "project.renamed",
            EventType::ProjectDescriptionChanged => "project.description_changed",
            EventType::ProjectWorkerAdded => "project.worker_added",
            EventType::ProjectWorkerRemoved => "project.worker_removed",
            EventType::ProjectDeleted => "project.deleted",
            EventType::OrderCreated => "order.created",
            EventType::OrderItemAdded => "order.item_added",
            EventType::OrderItemRemoved => "order.item_removed",
            EventType::OrderConfirmed => "order.confirmed",
            EventType::OrderShipped => "order.shipped",
            EventType::OrderCancelled => "order.cancelled",
            EventType::OrderDeleted => "order.deleted",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
        }
    }

    pub fn aggregate_type(&self) -> AggregateType {
        match self {
            EventType::ProjectCreated
            | EventType::ProjectRenamed
            | EventType::ProjectDescriptionChanged
            | EventType::ProjectWorkerAdded
            | EventType::ProjectWorkerRemoved
            | EventType::ProjectDeleted => AggregateType::Project,
            EventType::OrderCreated
            | EventType::OrderItemAdded
            | EventType::OrderItemRemoved
            | EventType::OrderConfirmed
            | EventType::OrderShipped
            | EventType::OrderCancelled
            | EventType::OrderDeleted => AggregateType::Order,
            EventType::UserCreated | EventType::UserUpdated | EventType::UserDeleted => {
                AggregateType::User
            }
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownDiscriminator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| UnknownDiscriminator(s.to_string()))
    }
}

// =========================================================================
// Event contract
// =========================================================================

/// Contract shared by every per-context event enum
pub trait AggregateEvent: Clone + fmt::Debug + Send + Sync + Into<DomainEvent> + 'static {
    /// Aggregate type whose streams hold these events
    const AGGREGATE_TYPE: AggregateType;

    fn event_type(&self) -> EventType;

    fn aggregate_id(&self) -> Uuid;

    fn occurred_at(&self) -> DateTime<Utc>;

    /// Borrow this context's event out of the cross-context wrapper
    fn from_domain_ref(event: &DomainEvent) -> Option<&Self>;

    /// Take this context's event out of the cross-context wrapper
    fn from_domain(event: DomainEvent) -> Result<Self, DomainEvent>;
}

// =========================================================================
// Project events
// =========================================================================

/// Project-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProjectEvent {
    /// Project was created
    #[serde(rename = "project.created")]
    ProjectCreated {
        project_id: Uuid,
        name: String,
        description: Option<String>,
        owner_id: Uuid,
        created_at: DateTime<Utc>,
    },

    /// Project was renamed
    #[serde(rename = "project.renamed")]
    ProjectRenamed {
        project_id: Uuid,
        name: String,
        renamed_at: DateTime<Utc>,
    },

    /// Project description was replaced or cleared
    #[serde(rename = "project.description_changed")]
    DescriptionChanged {
        project_id: Uuid,
        description: Option<String>,
        changed_at: DateTime<Utc>,
    },

    /// A user was assigned to the project
    #[serde(rename = "project.worker_added")]
    WorkerAdded {
        project_id: Uuid,
        worker_id: Uuid,
        added_at: DateTime<Utc>,
    },

    /// A user was unassigned from the project
    #[serde(rename = "project.worker_removed")]
    WorkerRemoved {
        project_id: Uuid,
        worker_id: Uuid,
        removed_at: DateTime<Utc>,
    },

    /// Project was deleted (soft delete)
    #[serde(rename = "project.deleted")]
    ProjectDeleted {
        project_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

impl AggregateEvent for ProjectEvent {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Project;

    fn event_type(&self) -> EventType {
        match self {
            ProjectEvent::ProjectCreated { .. } => EventType::ProjectCreated,
            ProjectEvent::ProjectRenamed { .. } => EventType::ProjectRenamed,
            ProjectEvent::DescriptionChanged { .. } => EventType::ProjectDescriptionChanged,
            ProjectEvent::WorkerAdded { .. } => EventType::ProjectWorkerAdded,
            ProjectEvent::WorkerRemoved { .. } => EventType::ProjectWorkerRemoved,
            ProjectEvent::ProjectDeleted { .. } => EventType::ProjectDeleted,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            ProjectEvent::ProjectCreated { project_id, .. }
            | ProjectEvent::ProjectRenamed { project_id, .. }
            | ProjectEvent::DescriptionChanged { project_id, .. }
            | ProjectEvent::WorkerAdded { project_id, .. }
            | ProjectEvent::WorkerRemoved { project_id, .. }
            | ProjectEvent::ProjectDeleted { project_id, .. } => *project_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProjectEvent::ProjectCreated { created_at, .. } => *created_at,
            ProjectEvent::ProjectRenamed { renamed_at, .. } => *renamed_at,
            ProjectEvent::DescriptionChanged { changed_at, .. } => *changed_at,
            ProjectEvent::WorkerAdded { added_at, .. } => *added_at,
            ProjectEvent::WorkerRemoved { removed_at, .. } => *removed_at,
            ProjectEvent::ProjectDeleted { deleted_at, .. } => *deleted_at,
        }
    }

    fn from_domain_ref(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::Project(event) => Some(event),
            _ => None,
        }
    }

    fn from_domain(event: DomainEvent) -> Result<Self, DomainEvent> {
        match event {
            DomainEvent::Project(event) => Ok(event),
            other => Err(other),
        }
    }
}

// =========================================================================
// Order events
// =========================================================================

/// A line on an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// quantity × unit price
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// Order was opened for a customer
    #[serde(rename = "order.created")]
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        created_at: DateTime<Utc>,
    },

    /// An item was added (or its quantity increased)
    #[serde(rename = "order.item_added")]
    ItemAdded {
        order_id: Uuid,
        item: OrderItem,
        added_at: DateTime<Utc>,
    },

    /// An item was removed from the order
    #[serde(rename = "order.item_removed")]
    ItemRemoved {
        order_id: Uuid,
        product_id: String,
        removed_at: DateTime<Utc>,
    },

    #[serde(rename = "order.confirmed")]
    OrderConfirmed {
        order_id: Uuid,
        confirmed_at: DateTime<Utc>,
    },

    #[serde(rename = "order.shipped")]
    OrderShipped {
        order_id: Uuid,
        shipped_at: DateTime<Utc>,
    },

    #[serde(rename = "order.cancelled")]
    OrderCancelled {
        order_id: Uuid,
        reason: Option<String>,
        cancelled_at: DateTime<Utc>,
    },

    /// Order was deleted (soft delete)
    #[serde(rename = "order.deleted")]
    OrderDeleted {
        order_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

impl AggregateEvent for OrderEvent {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Order;

    fn event_type(&self) -> EventType {
        match self {
            OrderEvent::OrderCreated { .. } => EventType::OrderCreated,
            OrderEvent::ItemAdded { .. } => EventType::OrderItemAdded,
            OrderEvent::ItemRemoved { .. } => EventType::OrderItemRemoved,
            OrderEvent::OrderConfirmed { .. } => EventType::OrderConfirmed,
            OrderEvent::OrderShipped { .. } => EventType::OrderShipped,
            OrderEvent::OrderCancelled { .. } => EventType::OrderCancelled,
            OrderEvent::OrderDeleted { .. } => EventType::OrderDeleted,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            OrderEvent::OrderCreated { order_id, .. }
            | OrderEvent::ItemAdded { order_id, .. }
            | OrderEvent::ItemRemoved { order_id, .. }
            | OrderEvent::OrderConfirmed { order_id, .. }
            | OrderEvent::OrderShipped { order_id, .. }
            | OrderEvent::OrderCancelled { order_id, .. }
            | OrderEvent::OrderDeleted { order_id, .. } => *order_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated { created_at, .. } => *created_at,
            OrderEvent::ItemAdded { added_at, .. } => *added_at,
            OrderEvent::ItemRemoved { removed_at, .. } => *removed_at,
            OrderEvent::OrderConfirmed { confirmed_at, .. } => *confirmed_at,
            OrderEvent::OrderShipped { shipped_at, .. } => *shipped_at,
            OrderEvent::OrderCancelled { cancelled_at, .. } => *cancelled_at,
            OrderEvent::OrderDeleted { deleted_at, .. } => *deleted_at,
        }
    }

    fn from_domain_ref(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::Order(event) => Some(event),
            _ => None,
        }
    }

    fn from_domain(event: DomainEvent) -> Result<Self, DomainEvent> {
        match event {
            DomainEvent::Order(event) => Ok(event),
            other => Err(other),
        }
    }
}

// =========================================================================
// User events
// =========================================================================

/// User-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserEvent {
    /// User was created
    #[serde(rename = "user.created")]
    UserCreated {
        user_id: Uuid,
        username: String,
        email: String,
        display_name: Option<String>,
        created_at: DateTime<Utc>,
    },

    /// User profile was updated
    #[serde(rename = "user.updated")]
    UserUpdated {
        user_id: Uuid,
        changes: UserChanges,
        updated_at: DateTime<Utc>,
    },

    /// User was deleted (soft delete)
    #[serde(rename = "user.deleted")]
    UserDeleted {
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

/// Changes made to a user profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none()
    }
}

impl AggregateEvent for UserEvent {
    const AGGREGATE_TYPE: AggregateType = AggregateType::User;

    fn event_type(&self) -> EventType {
        match self {
            UserEvent::UserCreated { .. } => EventType::UserCreated,
            UserEvent::UserUpdated { .. } => EventType::UserUpdated,
            UserEvent::UserDeleted { .. } => EventType::UserDeleted,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            UserEvent::UserCreated { user_id, .. }
            | UserEvent::UserUpdated { user_id, .. }
            | UserEvent::UserDeleted { user_id, .. } => *user_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserCreated { created_at, .. } => *created_at,
            UserEvent::UserUpdated { updated_at, .. } => *updated_at,
            UserEvent::UserDeleted { deleted_at, .. } => *deleted_at,
        }
    }

    fn from_domain_ref(event: &DomainEvent) -> Option<&Self> {
        match event {
            DomainEvent::User(event) => Some(event),
            _ => None,
        }
    }

    fn from_domain(event: DomainEvent) -> Result<Self, DomainEvent> {
        match event {
            DomainEvent::User(event) => Ok(event),
            other => Err(other),
        }
    }
}

// =========================================================================
// Cross-context wrapper
// =========================================================================

/// Any event of any bounded context
///
/// This is the currency of the serializer and the dispatcher, which both work
/// across contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Project(ProjectEvent),
    Order(OrderEvent),
    User(UserEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::Project(event) => event.event_type(),
            DomainEvent::Order(event) => event.event_type(),
            DomainEvent::User(event) => event.event_type(),
        }
    }

    pub fn aggregate_type(&self) -> AggregateType {
        self.event_type().aggregate_type()
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::Project(event) => event.aggregate_id(),
            DomainEvent::Order(event) => event.aggregate_id(),
            DomainEvent::User(event) => event.aggregate_id(),
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::Project(event) => event.occurred_at(),
            DomainEvent::Order(event) => event.occurred_at(),
            DomainEvent::User(event) => event.occurred_at(),
        }
    }
}

impl From<ProjectEvent> for DomainEvent {
    fn from(event: ProjectEvent) -> Self {
        DomainEvent::Project(event)
    }
}

impl From<OrderEvent> for DomainEvent {
    fn from(event: OrderEvent) -> Self {
        DomainEvent::Order(event)
    }
}

impl From<UserEvent> for DomainEvent {
    fn from(event: UserEvent) -> Self {
        DomainEvent::User(event)
    }
}

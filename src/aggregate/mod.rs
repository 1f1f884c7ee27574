//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//!
//! Every state change flows through [`Aggregate::handle_event`]. Live changes
//! enter through [`Aggregate::record_new`], which also queues the event for
//! persistence; history enters through [`Aggregate::catch_up`], which does not.
//! Both share one mutation path so that replay reproduces live state exactly.

pub mod order;
pub mod project;
pub mod user;

pub use order::{Order, OrderStatus};
pub use project::Project;
pub use user::User;

use uuid::Uuid;

use crate::domain::{AggregateEvent, AggregateType};

/// Version counter and uncommitted events of one in-memory aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRoot<E> {
    version: i64,
    pending: Vec<E>,
}

impl<E> Default for AggregateRoot<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AggregateRoot<E> {
    /// Root of an aggregate that has not applied any event yet
    pub fn new() -> Self {
        Self {
            version: 0,
            pending: Vec::new(),
        }
    }

    /// Root of an aggregate rebuilt from a snapshot taken at `version`
    pub fn restored(version: i64) -> Self {
        Self {
            version,
            pending: Vec::new(),
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    fn advance(&mut self) {
        self.version += 1;
    }

    fn push_pending(&mut self, event: E) {
        self.pending.push(event);
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized + Send + Sync + 'static {
    /// The type of events this aggregate handles
    type Event: AggregateEvent;

    /// Get the aggregate type (for storage)
    fn aggregate_type() -> AggregateType {
        <Self::Event as AggregateEvent>::AGGREGATE_TYPE
    }

    /// Empty placeholder that a full replay starts from
    fn blank(id: Uuid) -> Self;

    /// Get the aggregate ID
    fn id(&self) -> Uuid;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Mutate state for one event. Must not read the clock or any other
    /// ambient input: everything needed is on the event.
    fn handle_event(&mut self, event: &Self::Event);

    /// Number of events applied so far (restored from the snapshot when the
    /// aggregate was rebuilt from one)
    fn version(&self) -> i64 {
        self.root().version()
    }

    /// Events recorded in this session and not yet saved
    fn pending_events(&self) -> &[Self::Event] {
        self.root().pending()
    }

    fn clear_pending_events(&mut self) {
        self.root_mut().clear_pending();
    }

    /// Apply a new event and queue it for persistence
    fn record_new(&mut self, event: Self::Event) {
        mutate(self, &event);
        self.root_mut().push_pending(event);
    }

    /// Apply an already persisted event
    fn catch_up(&mut self, event: &Self::Event) {
        mutate(self, event);
    }
}

fn mutate<A: Aggregate>(aggregate: &mut A, event: &A::Event) {
    aggregate.handle_event(event);
    aggregate.root_mut().advance();
}

//! Domain module
//!
//! Core domain types: events, discriminators and business errors.

pub mod error;
pub mod events;

pub use error::DomainError;
pub use events::{
    AggregateEvent, AggregateType, DomainEvent, EventType, OrderEvent, OrderItem, ProjectEvent,
    UnknownDiscriminator, UserChanges, UserEvent,
};

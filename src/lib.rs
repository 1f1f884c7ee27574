//! tasklane Library
//!
//! Event-sourced Users / Projects / Orders backend.
//! Re-exports modules for integration testing and the server binary.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod event_store;
pub mod handlers;
pub mod snapshot;

pub use config::Config;
pub use domain::{DomainError, DomainEvent, EventType, OrderEvent, ProjectEvent, UserEvent};
pub use error::{AppError, AppResult};

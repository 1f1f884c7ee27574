//! Command definitions
//!
//! Commands represent intentions to change the system state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OrderItem, UserChanges};

// =========================================================================
// User commands
// =========================================================================

/// Command to create a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl CreateUserCommand {
    pub fn new(user_id: Uuid, username: String, email: String) -> Self {
        Self {
            user_id,
            username,
            email,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: String) -> Self {
        self.display_name = Some(display_name);
        self
    }
}

/// Command to update a user's profile
#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub user_id: Uuid,
    pub changes: UserChanges,
}

impl UpdateUserCommand {
    pub fn new(user_id: Uuid, changes: UserChanges) -> Self {
        Self { user_id, changes }
    }
}

// =========================================================================
// Project commands
// =========================================================================

/// Command to create a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectCommand {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

impl CreateProjectCommand {
    pub fn new(project_id: Uuid, name: String, owner_id: Uuid) -> Self {
        Self {
            project_id,
            name,
            description: None,
            owner_id,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

/// Partial update of a project
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct UpdateProjectCommand {
    pub project_id: Uuid,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl UpdateProjectCommand {
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            ..Self::default()
        }
    }

    pub fn rename(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn describe(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

// =========================================================================
// Order commands
// =========================================================================

/// Command to open an order, optionally with its first items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
}

impl CreateOrderCommand {
    pub fn new(order_id: Uuid, customer_id: Uuid) -> Self {
        Self {
            order_id,
            customer_id,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, product_id: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        self.items.push(OrderItem::new(product_id, quantity, unit_price));
        self
    }
}

/// Command to add an item to a pending order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemCommand {
    pub order_id: Uuid,
    pub item: OrderItem,
}

impl AddItemCommand {
    pub fn new(order_id: Uuid, product_id: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            order_id,
            item: OrderItem::new(product_id, quantity, unit_price),
        }
    }
}

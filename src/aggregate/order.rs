//! Order Aggregate
//!
//! Order lifecycle: Pending → Confirmed → Shipped, with cancellation allowed
//! from Pending or Confirmed. Items can only change while Pending.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, OrderEvent, OrderItem};
use crate::snapshot::Snapshotable;

use super::{Aggregate, AggregateRoot};

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order Aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: Uuid,
    customer_id: Uuid,
    items: Vec<OrderItem>,
    status: OrderStatus,
    cancellation_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    root: AggregateRoot<OrderEvent>,
}

/// Snapshot document of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Open a new order for a customer
    pub fn create(order_id: Uuid, customer_id: Uuid) -> Self {
        let mut order = Self::blank(order_id);
        order.record_new(OrderEvent::OrderCreated {
            order_id,
            customer_id,
            created_at: Utc::now(),
        });
        order
    }

    /// Add an item; adding a product already on the order increases its quantity
    pub fn add_item(&mut self, item: OrderItem) -> Result<(), DomainError> {
        self.ensure_status(OrderStatus::Pending, "change items of")?;

        if item.product_id.trim().is_empty() {
            return Err(DomainError::validation("product id must not be blank"));
        }
        if item.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if item.unit_price.is_sign_negative() {
            return Err(DomainError::validation("unit price must not be negative"));
        }
        let quantity = match self.item(&item.product_id) {
            Some(existing) => {
                if existing.unit_price != item.unit_price {
                    return Err(DomainError::validation(format!(
                        "product {} is already on the order at {}",
                        item.product_id, existing.unit_price
                    )));
                }
                existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                    DomainError::validation(format!(
                        "quantity of product {} is too large",
                        item.product_id
                    ))
                })?
            }
            None => item.quantity,
        };

        // Line and order totals must stay representable
        let line_total = item
            .unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| DomainError::validation("line total is out of range"))?;
        self.items
            .iter()
            .filter(|existing| existing.product_id != item.product_id)
            .try_fold(line_total, |total, existing| {
                total.checked_add(existing.line_total())
            })
            .ok_or_else(|| DomainError::validation("order total is out of range"))?;

        self.record_new(OrderEvent::ItemAdded {
            order_id: self.id,
            item,
            added_at: Utc::now(),
        });
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), DomainError> {
        self.ensure_status(OrderStatus::Pending, "change items of")?;
        if self.item(product_id).is_none() {
            return Err(DomainError::ItemNotFound {
                order_id: self.id,
                product_id: product_id.to_string(),
            });
        }

        self.record_new(OrderEvent::ItemRemoved {
            order_id: self.id,
            product_id: product_id.to_string(),
            removed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), DomainError> {
        self.ensure_status(OrderStatus::Pending, "confirm")?;
        if self.items.is_empty() {
            return Err(DomainError::EmptyOrder(self.id));
        }

        self.record_new(OrderEvent::OrderConfirmed {
            order_id: self.id,
            confirmed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn ship(&mut self) -> Result<(), DomainError> {
        self.ensure_status(OrderStatus::Confirmed, "ship")?;

        self.record_new(OrderEvent::OrderShipped {
            order_id: self.id,
            shipped_at: Utc::now(),
        });
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(DomainError::InvalidTransition {
                status: self.status.to_string(),
                action: "cancel",
            });
        }

        self.record_new(OrderEvent::OrderCancelled {
            order_id: self.id,
            reason,
            cancelled_at: Utc::now(),
        });
        Ok(())
    }

    /// Soft delete. Deleting twice is an error.
    pub fn delete(&mut self) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::AlreadyDeleted {
                aggregate_type: AggregateType::Order,
                id: self.id,
            });
        }

        self.record_new(OrderEvent::OrderDeleted {
            order_id: self.id,
            deleted_at: Utc::now(),
        });
        Ok(())
    }

    fn ensure_not_deleted(&self) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::Deleted {
                aggregate_type: AggregateType::Order,
                id: self.id,
            });
        }
        Ok(())
    }

    fn ensure_status(&self, required: OrderStatus, action: &'static str) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        if self.status != required {
            return Err(DomainError::InvalidTransition {
                status: self.status.to_string(),
                action,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn customer_id(&self) -> Uuid {
        self.customer_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, product_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
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
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn blank(id: Uuid) -> Self {
        Self {
            id,
            customer_id: Uuid::nil(),
            items: Vec::new(),
            status: OrderStatus::Pending,
            cancellation_reason: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            root: AggregateRoot::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn root(&self) -> &AggregateRoot<OrderEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<OrderEvent> {
        &mut self.root
    }

    fn handle_event(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::OrderCreated {
                order_id,
                customer_id,
                created_at,
            } => {
                self.id = *order_id;
                self.customer_id = *customer_id;
                self.status = OrderStatus::Pending;
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
            }

            OrderEvent::ItemAdded { item, added_at, .. } => {
                match self
                    .items
                    .iter_mut()
                    .find(|existing| existing.product_id == item.product_id)
                {
                    Some(existing) => {
                        existing.quantity = existing.quantity.saturating_add(item.quantity)
                    }
                    None => self.items.push(item.clone()),
                }
                self.updated_at = Some(*added_at);
            }

            OrderEvent::ItemRemoved {
                product_id,
                removed_at,
                ..
            } => {
                self.items.retain(|item| &item.product_id != product_id);
                self.updated_at = Some(*removed_at);
            }

            OrderEvent::OrderConfirmed { confirmed_at, .. } => {
                self.status = OrderStatus::Confirmed;
                self.updated_at = Some(*confirmed_at);
            }

            OrderEvent::OrderShipped { shipped_at, .. } => {
                self.status = OrderStatus::Shipped;
                self.updated_at = Some(*shipped_at);
            }

            OrderEvent::OrderCancelled {
                reason,
                cancelled_at,
                ..
            } => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = reason.clone();
                self.updated_at = Some(*cancelled_at);
            }

            OrderEvent::OrderDeleted { deleted_at, .. } => {
                self.deleted_at = Some(*deleted_at);
                self.updated_at = Some(*deleted_at);
            }
        }
    }
}

impl Snapshotable for Order {
    type State = OrderState;

    fn to_state(&self) -> OrderState {
        OrderState {
            id: self.id,
            customer_id: self.customer_id,
            items: self.items.clone(),
            status: self.status,
            cancellation_reason: self.cancellation_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }

    fn from_state(state: OrderState, version: i64) -> Self {
        Self {
            id: state.id,
            customer_id: state.customer_id,
            items: state.items,
            status: state.status,
            cancellation_reason: state.cancellation_reason,
            created_at: state.created_at,
            updated_at: state.updated_at,
            deleted_at: state.deleted_at,
            root: AggregateRoot::restored(version),
        }
    }
}

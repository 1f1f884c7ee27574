//! Order Handler
//!
//! Handles the order lifecycle with event sourcing.

use uuid::Uuid;

use crate::aggregate::{Order, User};
use crate::error::{AppError, AppResult};
use crate::event_store::{EventStoreRepository, Persistence};

use super::{load, modify, require_user, AddItemCommand, CreateOrderCommand, Scope};

/// Handler for order commands
#[derive(Clone)]
pub struct OrderHandler {
    orders: EventStoreRepository<Order>,
    users: EventStoreRepository<User>,
}

impl OrderHandler {
    pub fn new(persistence: Persistence) -> Self {
        Self {
            orders: EventStoreRepository::new(persistence.clone()),
            users: EventStoreRepository::new(persistence),
        }
    }

    /// Open an order with its initial items, stored in one append
    pub async fn create(&self, command: CreateOrderCommand) -> AppResult<Order> {
        require_user(&self.users, command.customer_id).await?;

        if self.orders.exists(command.order_id).await? {
            return Err(AppError::already_exists("order", command.order_id));
        }

        let mut order = Order::create(command.order_id, command.customer_id);
        for item in command.items {
            order.add_item(item)?;
        }

        self.orders.save(&mut order).await.map_err(|e| {
            if e.is_concurrency_conflict() {
                AppError::already_exists("order", command.order_id)
            } else {
                e.into()
            }
        })?;

        tracing::info!(
            order_id = %command.order_id,
            customer_id = %command.customer_id,
            items = order.items().len(),
            "Order created"
        );

        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> AppResult<Order> {
        load(&self.orders, order_id, Scope::Live).await
    }

    pub async fn add_item(&self, command: AddItemCommand) -> AppResult<Order> {
        modify(&self.orders, command.order_id, Scope::Live, "add_item", |order| {
            order.add_item(command.item.clone())
        })
        .await
    }

    pub async fn remove_item(&self, order_id: Uuid, product_id: &str) -> AppResult<Order> {
        modify(&self.orders, order_id, Scope::Live, "remove_item", |order| {
            order.remove_item(product_id)
        })
        .await
    }

    pub async fn confirm(&self, order_id: Uuid) -> AppResult<Order> {
        let order = modify(&self.orders, order_id, Scope::Live, "confirm_order", Order::confirm).await?;

        tracing::info!(order_id = %order_id, total = %order.total(), "Order confirmed");

        Ok(order)
    }

    pub async fn ship(&self, order_id: Uuid) -> AppResult<Order> {
        let order = modify(&self.orders, order_id, Scope::Live, "ship_order", Order::ship).await?;

        tracing::info!(order_id = %order_id, "Order shipped");

        Ok(order)
    }

    pub async fn cancel(&self, order_id: Uuid, reason: Option<String>) -> AppResult<Order> {
        let order = modify(&self.orders, order_id, Scope::Live, "cancel_order", |order| {
            order.cancel(reason.clone())
        })
        .await?;

        tracing::info!(order_id = %order_id, reason = ?order.cancellation_reason(), "Order cancelled");

        Ok(order)
    }

    /// Soft delete. Deleting a deleted order is `AlreadyDeleted`.
    pub async fn delete(&self, order_id: Uuid) -> AppResult<()> {
        modify(&self.orders, order_id, Scope::IncludingDeleted, "delete_order", Order::delete).await?;

        tracing::info!(order_id = %order_id, "Order deleted");

        Ok(())
    }
}

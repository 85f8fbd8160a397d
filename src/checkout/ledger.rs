use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::inventory::InventoryLedger;
use crate::{
    error::{AppError, AppResult},
    models::{NewOrder, Order, OrderStatus},
    repository::OrderRepository,
};

/// Order records and their status. Any status may be replaced by any other;
/// removing an order always hands its quantities back to inventory.
#[derive(Clone)]
pub struct OrderLedger {
    orders: Arc<dyn OrderRepository>,
    inventory: InventoryLedger,
    removals: Arc<Mutex<()>>,
}

impl OrderLedger {
    pub fn new(orders: Arc<dyn OrderRepository>, inventory: InventoryLedger) -> Self {
        Self {
            orders,
            inventory,
            removals: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, order: NewOrder) -> AppResult<Order> {
        let order = self.orders.insert(order).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            status = %order.status,
            total = order.total,
            "order recorded"
        );
        Ok(order)
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Order> {
        self.orders.find(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        self.orders.list_by_user(user_id).await
    }

    pub async fn list_all(&self) -> AppResult<Vec<Order>> {
        self.orders.list_all().await
    }

    pub async fn set_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Order> {
        let order = self
            .orders
            .update_status(id, status)
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(order_id = %id, status = %status, "order status updated");
        Ok(order)
    }

    /// Restores stock for every line item, whatever the status, then deletes
    /// the order. Removals are serialized so two deletes of one order cannot
    /// both restore; if the restore fails the order is kept.
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let _guard = self.removals.lock().await;

        let order = self.find(id).await?;
        self.inventory.release_items(&order.items).await?;

        let deleted = match self.orders.delete(id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                self.undo_release(id, &order).await;
                return Err(err);
            }
        };
        if !deleted {
            self.undo_release(id, &order).await;
            return Err(AppError::NotFound);
        }

        tracing::info!(order_id = %id, status = %order.status, "order removed, stock restored");
        Ok(())
    }

    async fn undo_release(&self, id: Uuid, order: &Order) {
        if let Err(err) = self.inventory.reserve_items(&order.items).await {
            tracing::error!(order_id = %id, error = %err, "failed to take back stock after order delete failed");
        }
    }
}

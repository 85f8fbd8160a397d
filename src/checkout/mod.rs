//! Settlement of a submitted cart into exactly one persisted order.
//!
//! Two protocols share one settlement path:
//! * direct: [`Checkout::submit`] asks the payment gateway for a verdict inline;
//! * two-phase: [`Checkout::initiate`] parks the cart in the session store and
//!   [`Checkout::confirm`] settles it once the payment page reports back.
//!
//! Stock is only touched on the authorized path, at settlement time. Nothing
//! is held between initiate and confirm, so two shoppers can race for the last
//! unit; the loser gets `InsufficientStock` on confirm.
//!
//! Line items are priced from the catalog at settlement time, never from the
//! request.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    dto::orders::OrderRequest,
    error::{AppError, AppResult},
    models::{NewOrder, Order, OrderItem, OrderStatus},
    repository::UserRepository,
};

pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod pricing;
pub mod sessions;

use gateway::{PaymentGateway, PaymentOutcome};
use inventory::InventoryLedger;
use ledger::OrderLedger;
use pricing::{OrderTotals, student_price};
use sessions::PaymentSessionStore;

/// Verdict literal the payment page reports for an approved payment.
pub const AUTHORIZED: &str = "AUTHORIZED";

/// Largest quantity of one product a single order may carry, summed over
/// repeated lines.
pub const MAX_LINE_QUANTITY: i32 = 1_000;

/// Accounts under this domain get the student discount.
pub const STUDENT_EMAIL_DOMAIN: &str = "@duocuc.cl";

pub struct Checkout {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<PaymentSessionStore>,
    inventory: InventoryLedger,
    ledger: OrderLedger,
    users: Arc<dyn UserRepository>,
}

impl Checkout {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        sessions: Arc<PaymentSessionStore>,
        inventory: InventoryLedger,
        ledger: OrderLedger,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            gateway,
            sessions,
            inventory,
            ledger,
            users,
        }
    }

    /// Direct checkout. A declined payment is not an error: it yields a
    /// `cancelled` order.
    pub async fn submit(&self, user_id: Uuid, request: OrderRequest) -> AppResult<Order> {
        validate_request(&request)?;
        let outcome = self.gateway.attempt();
        tracing::info!(user_id = %user_id, ?outcome, "payment attempted");
        self.settle(user_id, request, outcome).await
    }

    /// Opens a payment session and returns its token.
    pub fn initiate(&self, user_id: Uuid, request: OrderRequest) -> AppResult<String> {
        validate_request(&request)?;
        let token = self.sessions.create(user_id, request);
        tracing::info!(user_id = %user_id, "payment session opened");
        Ok(token)
    }

    /// Settles a session. The token is spent even when settlement then fails
    /// on stock.
    pub async fn confirm(&self, token: &str, external_status: &str) -> AppResult<Order> {
        let session = self.sessions.consume(token)?;
        let outcome = if external_status == AUTHORIZED {
            PaymentOutcome::Authorized
        } else {
            PaymentOutcome::Declined
        };
        tracing::info!(user_id = %session.user_id, ?outcome, "payment session confirmed");
        self.settle(session.user_id, session.order_request, outcome)
            .await
    }

    async fn settle(
        &self,
        user_id: Uuid,
        request: OrderRequest,
        outcome: PaymentOutcome,
    ) -> AppResult<Order> {
        let student = self.is_student(user_id).await?;
        let items = self.snapshot_items(request.items, student).await?;
        let totals = OrderTotals::compute(&items, request.delivery_option)?;

        let status = match outcome {
            PaymentOutcome::Authorized => {
                self.inventory.reserve_items(&items).await?;
                OrderStatus::Completed
            }
            PaymentOutcome::Declined => OrderStatus::Cancelled,
        };

        let order = NewOrder {
            user_id,
            items,
            subtotal: totals.subtotal,
            duoc_discount: totals.duoc_discount,
            tax: totals.tax,
            shipping_cost: totals.shipping_cost,
            total: totals.total,
            delivery_option: request.delivery_option,
            shipping_info: request.shipping_info,
            status,
        };
        let items = order.items.clone();
        match self.ledger.append(order).await {
            Ok(order) => Ok(order),
            Err(err) => {
                if status == OrderStatus::Completed {
                    if let Err(release_err) = self.inventory.release_items(&items).await {
                        tracing::error!(error = %release_err, "failed to release stock after order write failure");
                    }
                }
                Err(err)
            }
        }
    }

    async fn is_student(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .users
            .find_user(user_id)
            .await?
            .is_some_and(|user| user.email.to_ascii_lowercase().ends_with(STUDENT_EMAIL_DOMAIN)))
    }

    /// Replaces whatever the client sent for name, price, image and discount
    /// with the current catalog entry.
    async fn snapshot_items(&self, items: Vec<OrderItem>, student: bool) -> AppResult<Vec<OrderItem>> {
        let mut snapshot = Vec::with_capacity(items.len());
        for item in items {
            let product = self.inventory.product(&item.product_id).await?;
            let (price, original_price) = if student {
                let discounted = student_price(product.price).ok_or_else(|| {
                    AppError::BadRequest(format!("Invalid price for product {}", product.id))
                })?;
                (discounted, Some(product.price))
            } else {
                (product.price, None)
            };
            snapshot.push(OrderItem {
                product_id: product.id,
                quantity: item.quantity,
                name: product.name,
                price,
                image: product.image_url,
                original_price,
                discount_applied: student,
            });
        }
        Ok(snapshot)
    }
}

pub fn validate_request(request: &OrderRequest) -> AppResult<()> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }

    let mut per_product: HashMap<&str, i64> = HashMap::new();
    for item in &request.items {
        if item.product_id.trim().is_empty() {
            return Err(AppError::BadRequest("Order item is missing a product id".into()));
        }
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for product {}",
                item.product_id
            )));
        }
        let total = per_product.entry(item.product_id.as_str()).or_insert(0);
        *total += i64::from(item.quantity);
        if *total > i64::from(MAX_LINE_QUANTITY) {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_LINE_QUANTITY} units of product {} per order",
                item.product_id
            )));
        }
    }
    Ok(())
}

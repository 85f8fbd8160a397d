use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{OrderItem, Product},
    repository::{ProductRepository, StockLine},
};

/// The only writer of product stock. Reservation decrements, release restores.
#[derive(Clone)]
pub struct InventoryLedger {
    products: Arc<dyn ProductRepository>,
}

impl InventoryLedger {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    pub async fn product(&self, product_id: &str) -> AppResult<Product> {
        self.products
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::ProductNotFound(product_id.to_string()))
    }

    pub async fn stock_of(&self, product_id: &str) -> AppResult<i32> {
        Ok(self.product(product_id).await?.stock)
    }

    pub async fn reserve(&self, product_id: &str, quantity: i32) -> AppResult<()> {
        self.reserve_lines(vec![StockLine::new(product_id, quantity)])
            .await
    }

    /// Reserves every line item of an order, or none of them.
    pub async fn reserve_items(&self, items: &[OrderItem]) -> AppResult<()> {
        self.reserve_lines(lines_of(items)).await
    }

    pub async fn release(&self, product_id: &str, quantity: i32) -> AppResult<()> {
        self.release_lines(vec![StockLine::new(product_id, quantity)])
            .await
    }

    pub async fn release_items(&self, items: &[OrderItem]) -> AppResult<()> {
        self.release_lines(lines_of(items)).await
    }

    async fn reserve_lines(&self, lines: Vec<StockLine>) -> AppResult<()> {
        ensure_positive(&lines)?;
        match self.products.reserve_stock(&lines).await {
            Ok(()) => {
                tracing::debug!(lines = lines.len(), "stock reserved");
                Ok(())
            }
            Err(err) => {
                tracing::info!(error = %err, "stock reservation rejected");
                Err(err)
            }
        }
    }

    async fn release_lines(&self, lines: Vec<StockLine>) -> AppResult<()> {
        ensure_positive(&lines)?;
        self.products.release_stock(&lines).await?;
        tracing::debug!(lines = lines.len(), "stock released");
        Ok(())
    }
}

fn lines_of(items: &[OrderItem]) -> Vec<StockLine> {
    items
        .iter()
        .map(|item| StockLine::new(item.product_id.clone(), item.quantity))
        .collect()
}

fn ensure_positive(lines: &[StockLine]) -> AppResult<()> {
    match lines.iter().find(|line| line.quantity <= 0) {
        Some(line) => Err(AppError::BadRequest(format!(
            "quantity for product {} must be positive",
            line.product_id
        ))),
        None => Ok(()),
    }
}

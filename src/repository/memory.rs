//! In-memory stores backed by `tokio::sync::RwLock` maps. Used when no
//! database is configured and throughout the test suite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuditEntry, AuditRepository, OrderRepository, ProductRepository, StockLine, UserRepository,
    aggregate_lines,
};
use crate::{
    error::{AppError, AppResult},
    models::{NewOrder, Order, OrderStatus, Product, User},
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryProductRepository {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get_product(&self, id: &str) -> AppResult<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let mut items: Vec<Product> = self.products.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> AppResult<()> {
        let totals = aggregate_lines(lines);
        // One write guard covers validation and mutation, so no other
        // reservation can interleave between the check and the decrement.
        let mut products = self.products.write().await;

        for (id, quantity) in &totals {
            let product = products
                .get(*id)
                .ok_or_else(|| AppError::ProductNotFound(id.to_string()))?;
            if i64::from(product.stock) < *quantity {
                return Err(AppError::InsufficientStock {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                });
            }
        }

        for (id, quantity) in &totals {
            if let Some(product) = products.get_mut(*id) {
                // Bounded by the current stock checked above.
                product.stock -= *quantity as i32;
            }
        }
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> AppResult<()> {
        let totals = aggregate_lines(lines);
        let mut products = self.products.write().await;

        let mut restored = Vec::with_capacity(totals.len());
        for (id, quantity) in &totals {
            match products.get(*id) {
                Some(product) => restored.push((*id, restored_stock(product, *quantity)?)),
                None => tracing::warn!(product_id = %id, quantity, "release skipped, product missing"),
            }
        }

        for (id, stock) in restored {
            if let Some(product) = products.get_mut(id) {
                product.stock = stock;
            }
        }
        Ok(())
    }
}

fn restored_stock(product: &Product, quantity: i64) -> AppResult<i32> {
    i64::from(product.stock)
        .checked_add(quantity)
        .and_then(|stock| i32::try_from(stock).ok())
        .ok_or_else(|| {
            AppError::BadRequest(format!("stock for product {} would overflow", product.id))
        })
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: NewOrder) -> AppResult<Order> {
        let order = Order::from_new(Uuid::new_v4(), Utc::now(), order);
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn list_all(&self) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await.values().cloned().collect();
        Ok(newest_first(orders))
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str, role: &str) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(AppError::BadRequest("Email is already taken".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditRepository {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditRepository {
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, stock: i32) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {id}"),
            description: None,
            price: 10_000,
            stock,
            image_url: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing() {
        let repo = InMemoryProductRepository::with_products([product("1", 5), product("2", 1)]);

        let err = repo
            .reserve_stock(&[StockLine::new("1", 2), StockLine::new("2", 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { ref product_id, .. } if product_id == "2"));

        assert_eq!(repo.get_product("1").await.unwrap().unwrap().stock, 5);
        assert_eq!(repo.get_product("2").await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn repeated_lines_are_checked_together() {
        let repo = InMemoryProductRepository::with_products([product("1", 3)]);

        let err = repo
            .reserve_stock(&[StockLine::new("1", 2), StockLine::new("1", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));

        repo.reserve_stock(&[StockLine::new("1", 1), StockLine::new("1", 2)])
            .await
            .unwrap();
        assert_eq!(repo.get_product("1").await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn unknown_product_fails_reservation() {
        let repo = InMemoryProductRepository::with_products([product("1", 3)]);
        let err = repo
            .reserve_stock(&[StockLine::new("1", 1), StockLine::new("99", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProductNotFound(ref id) if id == "99"));
        assert_eq!(repo.get_product("1").await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn release_skips_missing_products() {
        let repo = InMemoryProductRepository::with_products([product("1", 3)]);
        repo.release_stock(&[StockLine::new("1", 2), StockLine::new("gone", 4)])
            .await
            .unwrap();
        assert_eq!(repo.get_product("1").await.unwrap().unwrap().stock, 5);
        assert!(repo.get_product("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn release_past_stock_range_changes_nothing() {
        let repo = InMemoryProductRepository::with_products([product("1", 3), product("2", i32::MAX - 1)]);
        let err = repo
            .release_stock(&[StockLine::new("1", 2), StockLine::new("2", 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(repo.get_product("1").await.unwrap().unwrap().stock, 3);
        assert_eq!(repo.get_product("2").await.unwrap().unwrap().stock, i32::MAX - 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = InMemoryUserRepository::default();
        repo.create_user("juan@example.com", "hash", "user").await.unwrap();
        let err = repo
            .create_user("juan@example.com", "hash", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

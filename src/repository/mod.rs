use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppResult,
    models::{NewOrder, Order, OrderStatus, Product, User},
};

pub mod memory;
pub mod postgres;

/// A stock movement against one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: i32,
}

impl StockLine {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Sums quantities per product so repeated lines are checked against stock as one.
/// Keys come out sorted, which also fixes the row-lock order.
pub fn aggregate_lines(lines: &[StockLine]) -> BTreeMap<&str, i64> {
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals.entry(line.product_id.as_str()).or_insert(0) += i64::from(line.quantity);
    }
    totals
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(&self, id: &str) -> AppResult<Option<Product>>;

    async fn list_products(&self) -> AppResult<Vec<Product>>;

    async fn save_product(&self, product: Product) -> AppResult<Product>;

    /// Decrements every line or none. Fails with `ProductNotFound` or
    /// `InsufficientStock` before touching any row.
    async fn reserve_stock(&self, lines: &[StockLine]) -> AppResult<()>;

    /// Adds quantities back. Products that no longer exist are skipped.
    async fn release_stock(&self, lines: &[StockLine]) -> AppResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: NewOrder) -> AppResult<Order>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

    /// Newest first.
    async fn list_all(&self) -> AppResult<Vec<Order>>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn create_user(&self, email: &str, password_hash: &str, role: &str) -> AppResult<User>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

/// The set of backing stores the service runs on.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub users: Arc<dyn UserRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            products: Arc::new(memory::InMemoryProductRepository::default()),
            orders: Arc::new(memory::InMemoryOrderRepository::default()),
            users: Arc::new(memory::InMemoryUserRepository::default()),
            audit: Arc::new(memory::InMemoryAuditRepository::default()),
        }
    }

    pub fn postgres(pool: DbPool) -> Self {
        let orm = crate::db::orm_from_pool(pool.clone());
        Self {
            products: Arc::new(postgres::PgProductRepository::new(orm.clone())),
            orders: Arc::new(postgres::PgOrderRepository::new(orm.clone())),
            users: Arc::new(postgres::PgUserRepository::new(orm)),
            audit: Arc::new(postgres::PgAuditRepository::new(pool)),
        }
    }
}

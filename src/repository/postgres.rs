//! Postgres stores: SeaORM entities for catalog, orders and users, a raw sqlx
//! insert for the audit trail.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::{
    AuditEntry, AuditRepository, OrderRepository, ProductRepository, StockLine, UserRepository,
    aggregate_lines,
};
use crate::{
    db::{DbPool, OrmConn},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{NewOrder, Order, OrderStatus, Product, User},
};

pub struct PgProductRepository {
    orm: OrmConn,
}

impl PgProductRepository {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

fn quantity_to_i32(quantity: i64) -> AppResult<i32> {
    i32::try_from(quantity).map_err(|_| AppError::BadRequest("quantity out of range".into()))
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_product(&self, id: &str) -> AppResult<Option<Product>> {
        Ok(Products::find_by_id(id.to_string())
            .one(&self.orm)
            .await?
            .map(product_from_entity))
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        Ok(Products::find()
            .order_by_asc(ProdCol::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect())
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        let active = ProductActive {
            id: Set(product.id.clone()),
            name: Set(product.name.clone()),
            description: Set(product.description.clone()),
            price: Set(product.price),
            stock: Set(product.stock),
            image_url: Set(product.image_url.clone()),
            category: Set(product.category.clone()),
            created_at: NotSet,
        };

        Products::insert(active)
            .on_conflict(
                OnConflict::column(ProdCol::Id)
                    .update_columns([
                        ProdCol::Name,
                        ProdCol::Description,
                        ProdCol::Price,
                        ProdCol::Stock,
                        ProdCol::ImageUrl,
                        ProdCol::Category,
                    ])
                    .to_owned(),
            )
            .exec(&self.orm)
            .await?;

        Ok(product)
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> AppResult<()> {
        let totals = aggregate_lines(lines);
        let ids: Vec<String> = totals.keys().map(|id| id.to_string()).collect();

        let txn = self.orm.begin().await?;

        // Rows are locked in id order so concurrent checkouts cannot deadlock.
        let rows: HashMap<String, ProductModel> = Products::find()
            .filter(ProdCol::Id.is_in(ids))
            .order_by_asc(ProdCol::Id)
            .lock(LockType::Update)
            .all(&txn)
            .await?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect();

        for (id, quantity) in &totals {
            let row = rows
                .get(*id)
                .ok_or_else(|| AppError::ProductNotFound(id.to_string()))?;
            if i64::from(row.stock) < *quantity {
                return Err(AppError::InsufficientStock {
                    product_id: row.id.clone(),
                    name: row.name.clone(),
                });
            }
        }

        for (id, quantity) in &totals {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity_to_i32(*quantity)?))
                .filter(ProdCol::Id.eq(*id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> AppResult<()> {
        let totals = aggregate_lines(lines);
        let ids: Vec<String> = totals.keys().map(|id| id.to_string()).collect();

        let txn = self.orm.begin().await?;

        let rows: HashMap<String, ProductModel> = Products::find()
            .filter(ProdCol::Id.is_in(ids))
            .order_by_asc(ProdCol::Id)
            .lock(LockType::Update)
            .all(&txn)
            .await?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect();

        for (id, quantity) in &totals {
            let Some(row) = rows.get(*id) else {
                tracing::warn!(product_id = %id, quantity, "release skipped, product missing");
                continue;
            };
            let stock = i64::from(row.stock)
                .checked_add(*quantity)
                .and_then(|stock| i32::try_from(stock).ok())
                .ok_or_else(|| {
                    AppError::BadRequest(format!("stock for product {} would overflow", row.id))
                })?;
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::value(stock))
                .filter(ProdCol::Id.eq(*id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

pub struct PgOrderRepository {
    orm: OrmConn,
}

impl PgOrderRepository {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: NewOrder) -> AppResult<Order> {
        let now = Utc::now();
        let items = serde_json::to_value(&order.items).map_err(anyhow::Error::from)?;
        let shipping_info = serde_json::to_value(&order.shipping_info).map_err(anyhow::Error::from)?;

        let model = OrderActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(order.user_id),
            items: Set(items),
            subtotal: Set(order.subtotal),
            duoc_discount: Set(order.duoc_discount),
            tax: Set(order.tax),
            shipping_cost: Set(order.shipping_cost),
            total: Set(order.total),
            delivery_option: Set(order.delivery_option.as_str().to_string()),
            shipping_info: Set(shipping_info),
            status: Set(order.status.as_str().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.orm)
        .await?;

        order_from_entity(model)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        Orders::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn list_all(&self) -> AppResult<Vec<Order>> {
        Orders::find()
            .order_by_desc(OrderCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        let existing = match Orders::find_by_id(id).one(&self.orm).await? {
            Some(o) => o,
            None => return Ok(None),
        };

        let mut active: OrderActive = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        let order = active.update(&self.orm).await?;

        order_from_entity(order).map(Some)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = Orders::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }
}

pub struct PgUserRepository {
    orm: OrmConn,
}

impl PgUserRepository {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(Users::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(user_from_entity))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(Users::find()
            .filter(UserCol::Email.eq(email))
            .one(&self.orm)
            .await?
            .map(user_from_entity))
    }

    async fn create_user(&self, email: &str, password_hash: &str, role: &str) -> AppResult<User> {
        let user = UserActive {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;

        Ok(user_from_entity(user))
    }
}

pub struct PgAuditRepository {
    pool: DbPool,
}

impl PgAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        image_url: model.image_url,
        category: model.category,
    }
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let corrupt = |field: &str, err: String| {
        AppError::Internal(anyhow::anyhow!("order {} has invalid {field}: {err}", model.id))
    };

    let items = serde_json::from_value(model.items.clone())
        .map_err(|e| corrupt("items", e.to_string()))?;
    let shipping_info = serde_json::from_value(model.shipping_info.clone())
        .map_err(|e| corrupt("shipping_info", e.to_string()))?;
    let delivery_option = model
        .delivery_option
        .parse()
        .map_err(|e| corrupt("delivery_option", e))?;
    let status = model.status.parse().map_err(|e| corrupt("status", e))?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        items,
        subtotal: model.subtotal,
        duoc_discount: model.duoc_discount,
        tax: model.tax,
        shipping_cost: model.shipping_cost,
        total: model.total,
        delivery_option,
        shipping_info,
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

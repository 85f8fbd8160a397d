use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

/// Line item. Clients only need to send `productId` and `quantity`; name,
/// price, image and the discount fields are overwritten from the catalog when
/// the order is settled and never follow later catalog edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub original_price: Option<i64>,
    #[serde(default)]
    pub discount_applied: bool,
}

impl OrderItem {
    /// Unit price before the student discount. Lines without the discount
    /// flag are charged at `price` whatever `original_price` says.
    pub fn list_price(&self) -> i64 {
        match (self.discount_applied, self.original_price) {
            (true, Some(original)) => original.max(self.price),
            _ => self.price,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOption {
    #[default]
    Standard,
    Express,
    Pickup,
}

impl DeliveryOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOption::Standard => "standard",
            DeliveryOption::Express => "express",
            DeliveryOption::Pickup => "pickup",
        }
    }

    pub fn shipping_cost(&self) -> i64 {
        match self {
            DeliveryOption::Standard => 2500,
            DeliveryOption::Express => 5000,
            DeliveryOption::Pickup => 0,
        }
    }
}

impl FromStr for DeliveryOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(DeliveryOption::Standard),
            "express" => Ok(DeliveryOption::Express),
            "pickup" => Ok(DeliveryOption::Pickup),
            other => Err(format!("unknown delivery option '{other}'")),
        }
    }
}

/// Order lifecycle status. Parsing is case-insensitive, the persisted form is lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An order as submitted to the ledger, before an id and timestamps are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub duoc_discount: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub delivery_option: DeliveryOption,
    pub shipping_info: ShippingInfo,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub duoc_discount: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub delivery_option: DeliveryOption,
    pub shipping_info: ShippingInfo,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewOrder) -> Self {
        Self {
            id,
            user_id: new.user_id,
            items: new.items,
            subtotal: new.subtotal,
            duoc_discount: new.duoc_discount,
            tax: new.tax,
            shipping_cost: new.shipping_cost,
            total: new.total,
            delivery_option: new.delivery_option,
            shipping_info: new.shipping_info,
            status: new.status,
            created_at,
            updated_at: created_at,
        }
    }
}

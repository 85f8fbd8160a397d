use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{DeliveryOption, Order, OrderItem, ShippingInfo};

/// Cart submission. Totals sent by the storefront are ignored and derived
/// server-side from the items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_info: ShippingInfo,
    #[serde(default)]
    pub delivery_option: DeliveryOption,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}

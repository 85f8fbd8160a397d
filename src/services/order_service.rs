use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, OrderRequest, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: OrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = state.checkout.submit(user.user_id, payload).await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = match order.status {
        OrderStatus::Completed => "Payment approved",
        _ => "Payment declined",
    };
    Ok(ApiResponse::success(message, order, Some(Meta::empty())))
}

/// Admins see every order, everyone else only their own.
pub async fn list_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let items = if user.is_admin() {
        state.orders.list_all().await?
    } else {
        state.orders.list_by_user(user.user_id).await?
    };

    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_accessible(state, user, id).await?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let status: OrderStatus = payload
        .status
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("status is required".into()))?
        .parse()
        .map_err(AppError::BadRequest)?;

    find_accessible(state, user, id).await?;
    let order = state.orders.set_status(id, status).await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    find_accessible(state, user, id).await?;
    state.orders.remove(id).await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(())
}

/// Someone else's order is reported as missing rather than forbidden.
async fn find_accessible(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Order> {
    let order = state.orders.find(id).await?;
    if !user.can_access(order.user_id) {
        return Err(AppError::NotFound);
    }
    Ok(order)
}

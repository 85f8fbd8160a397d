use crate::{
    audit::log_audit,
    dto::{
        orders::OrderRequest,
        payments::{ConfirmPaymentRequest, ConfirmPaymentResponse, InitiatePaymentResponse},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderStatus,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn initiate_payment(
    state: &AppState,
    user: &AuthUser,
    payload: OrderRequest,
) -> AppResult<ApiResponse<InitiatePaymentResponse>> {
    let token = state.checkout.initiate(user.user_id, payload)?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "payment_initiated",
        Some("payments"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment started",
        InitiatePaymentResponse {
            url: state.config.payment_page_url.clone(),
            token,
        },
        Some(Meta::empty()),
    ))
}

pub async fn confirm_payment(
    state: &AppState,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<ConfirmPaymentResponse>> {
    let (token, status) = match (non_blank(payload.token), non_blank(payload.status)) {
        (Some(token), Some(status)) => (token, status),
        _ => return Err(AppError::BadRequest("token and status are required".into())),
    };

    // Confirm answers with 200 or 400 only.
    let order = state
        .checkout
        .confirm(&token, &status)
        .await
        .map_err(|err| match err {
            AppError::InsufficientStock { .. } | AppError::ProductNotFound(_) => {
                AppError::BadRequest(err.to_string())
            }
            other => other,
        })?;

    if let Err(err) = log_audit(
        state,
        Some(order.user_id),
        "payment_confirmed",
        Some("payments"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let response = if order.status == OrderStatus::Completed {
        ConfirmPaymentResponse {
            status: "success".into(),
            order_id: order.id,
            redirect: format!("/checkout/success/{}", order.id),
        }
    } else {
        ConfirmPaymentResponse {
            status: "failed".into(),
            order_id: order.id,
            redirect: "/checkout/error".into(),
        }
    };

    Ok(ApiResponse::success(
        "Payment confirmed",
        response,
        Some(Meta::empty()),
    ))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

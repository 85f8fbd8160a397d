use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::{
        orders::OrderRequest,
        payments::{ConfirmPaymentRequest, ConfirmPaymentResponse, InitiatePaymentResponse},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/iniciar", post(initiate_payment))
        .route("/confirmar", post(confirm_payment))
}

#[utoipa::path(
    post,
    path = "/api/pago/iniciar",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Payment session opened", body = ApiResponse<InitiatePaymentResponse>),
        (status = 400, description = "Invalid cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OrderRequest>,
) -> AppResult<Json<ApiResponse<InitiatePaymentResponse>>> {
    let resp = payment_service::initiate_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Called by the payment page; the session token is the caller's credential.
#[utoipa::path(
    post,
    path = "/api/pago/confirmar",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Session settled", body = ApiResponse<ConfirmPaymentResponse>),
        (status = 400, description = "Missing fields, unknown or expired session, or stock ran out"),
    ),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<ConfirmPaymentResponse>>> {
    let resp = payment_service::confirm_payment(&state, payload).await?;
    Ok(Json(resp))
}

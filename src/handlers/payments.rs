use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;

use crate::gateway::ParameterSet;
use crate::handlers::AppState;
use crate::services::payments::PaymentResult;
use crate::{ApiResponse, ApiResult};

/// Gateway return callback
///
/// The browser lands here after paying. The query carries the gateway's
/// signed `vnp_*` fields plus the shop's own `orderId`.
#[utoipa::path(
    get,
    path = "/api/v1/payments/vnpay/return",
    params(
        ("orderId" = i32, Query, description = "Order the payment belongs to"),
        ("vnp_SecureHash" = String, Query, description = "Gateway signature over the vnp_ fields")
    ),
    responses(
        (status = 200, description = "Callback processed; see `success`", body = crate::ApiResponse<crate::services::payments::PaymentResult>),
        (status = 400, description = "Malformed order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<PaymentResult> {
    let params: ParameterSet = query.into_iter().collect();
    let result = state.services.payments.handle_return(&params).await?;
    Ok(Json(ApiResponse::success(result)))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/vnpay/return", get(vnpay_return))
}

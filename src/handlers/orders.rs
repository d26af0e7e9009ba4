use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

use crate::entities::order::{Model as OrderModel, PaymentStatus};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::middleware_helpers::ClientIp;
use crate::repositories::OrderFilter;
use crate::services::orders::{
    CreateOrderRequest, IncomeSummary, OrderDetails, UpdateOrderRequest,
};
use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// PENDING, PAID or FAILED
    pub status: Option<String>,
    /// Keyword matched against customer name, phone and flower names
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncomeQuery {
    /// Keyword matched against customer name, phone and flower names
    pub search: Option<String>,
    /// PENDING, PAID or FAILED
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentUrlResponse {
    pub order_id: i32,
    pub payment_url: String,
}

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = crate::ApiResponse<crate::services::orders::OrderDetails>),
        (status = 400, description = "Invalid order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown flower", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    let order = state.services.orders.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Page of orders", body = crate::ApiResponse<crate::PaginatedResponse<crate::entities::order::Model>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderModel>> {
    let filter = OrderFilter {
        status: parse_optional_status(query.status.as_deref())?,
        search: query.search,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(query.limit);

    let (items, total) = state
        .services
        .orders
        .list_orders(&filter, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

/// Get an order with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = crate::ApiResponse<crate::services::orders::OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Edit an order's delivery details
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = crate::ApiResponse<crate::entities::order::Model>),
        (status = 400, description = "Invalid details", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<OrderModel> {
    let order = state.services.orders.update_order(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Delete an order and its items
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Income note: matching orders and their grand total
#[utoipa::path(
    get,
    path = "/api/v1/orders/income",
    params(IncomeQuery),
    responses(
        (status = 200, description = "Matching orders and grand total", body = crate::ApiResponse<crate::services::orders::IncomeSummary>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn income_summary(
    State(state): State<AppState>,
    Query(query): Query<IncomeQuery>,
) -> ApiResult<IncomeSummary> {
    let filter = OrderFilter {
        status: parse_optional_status(query.status.as_deref())?,
        search: query.search,
    };
    let summary = state.services.orders.income_summary(&filter).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Signed gateway URL for paying an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payment-url",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payment URL created", body = crate::ApiResponse<PaymentUrlResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 500, description = "Cannot construct payment URL", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_url(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ClientIp(client_ip): ClientIp,
) -> ApiResult<PaymentUrlResponse> {
    let payment_url = state.services.payments.checkout_url(id, client_ip).await?;
    Ok(Json(ApiResponse::success(PaymentUrlResponse {
        order_id: id,
        payment_url,
    })))
}

/// Redirect the browser to the gateway
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/checkout",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 303, description = "Redirect to the payment gateway"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ClientIp(client_ip): ClientIp,
) -> Result<Redirect, ServiceError> {
    let url = state.services.payments.checkout_url(id, client_ip).await?;
    Ok(Redirect::to(&url))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/income", get(income_summary))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/payment-url", get(payment_url))
        .route("/:id/checkout", get(checkout))
}

fn parse_optional_status(value: Option<&str>) -> Result<Option<PaymentStatus>, ServiceError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_status_filter)
        .transpose()
}

fn parse_status_filter(value: &str) -> Result<PaymentStatus, ServiceError> {
    PaymentStatus::from_str(value)
        .map_err(|_| ServiceError::InvalidInput(format!("unknown payment status {:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(parse_status_filter("paid").unwrap(), PaymentStatus::Paid);
        assert_eq!(parse_status_filter("PENDING").unwrap(), PaymentStatus::Pending);
        assert!(matches!(
            parse_status_filter("refunded"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(parse_optional_status(Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_status(None).unwrap(), None);
    }
}

use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flower Shop API",
        version = "0.1.0",
        description = r#"
Catalog, order placement and VNPay checkout for a flower shop.

Orders are created PENDING. `GET /api/v1/orders/{id}/checkout` redirects the
customer to the gateway with a signed URL; the gateway sends the customer back
to `GET /api/v1/payments/vnpay/return`, which verifies the signature and marks
the order PAID or FAILED.
"#
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::flowers::list_flowers,
        crate::handlers::flowers::get_flower,
        crate::handlers::flowers::create_flower,
        crate::handlers::flowers::update_flower,
        crate::handlers::flowers::delete_flower,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::income_summary,
        crate::handlers::orders::payment_url,
        crate::handlers::orders::checkout,
        crate::handlers::payments::vnpay_return,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::PaymentStatus,
        crate::services::categories::CreateCategoryRequest,
        crate::services::flowers::CreateFlowerRequest,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::UpdateOrderRequest,
        crate::services::orders::IncomeSummary,
        crate::services::orders::OrderLineRequest,
        crate::services::payments::PaymentResult,
        crate::handlers::orders::PaymentUrlResponse,
        crate::handlers::health::HealthResponse,
    )),
    tags(
        (name = "Health", description = "Liveness and database status"),
        (name = "Categories", description = "Flower categories"),
        (name = "Flowers", description = "Flower catalog"),
        (name = "Orders", description = "Order placement and lookup"),
        (name = "Payments", description = "VNPay checkout and return callback")
    )
)]
pub struct ApiDoc;

pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::entities::flower::Model as FlowerModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::repositories::FlowerFilter;
use crate::services::flowers::CreateFlowerRequest;
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FlowerSearch {
    /// Case-insensitive name keyword
    pub search: Option<String>,
    /// Only flowers in this category
    pub category_id: Option<i32>,
}

/// List the catalog
#[utoipa::path(
    get,
    path = "/api/v1/flowers",
    params(FlowerSearch),
    responses(
        (status = 200, description = "Flowers ordered by name", body = crate::ApiResponse<Vec<crate::entities::flower::Model>>)
    ),
    tag = "Flowers"
)]
pub async fn list_flowers(
    State(state): State<AppState>,
    Query(query): Query<FlowerSearch>,
) -> ApiResult<Vec<FlowerModel>> {
    let filter = FlowerFilter {
        search: query.search,
        category_id: query.category_id,
    };
    let flowers = state.services.flowers.list_flowers(&filter).await?;
    Ok(Json(ApiResponse::success(flowers)))
}

/// Get one flower
#[utoipa::path(
    get,
    path = "/api/v1/flowers/{id}",
    params(("id" = i32, Path, description = "Flower id")),
    responses(
        (status = 200, description = "Flower found", body = crate::ApiResponse<crate::entities::flower::Model>),
        (status = 404, description = "Flower not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Flowers"
)]
pub async fn get_flower(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<FlowerModel> {
    let flower = state.services.flowers.get_flower(id).await?;
    Ok(Json(ApiResponse::success(flower)))
}

/// Add a flower to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/flowers",
    request_body = CreateFlowerRequest,
    responses(
        (status = 201, description = "Flower created", body = crate::ApiResponse<crate::entities::flower::Model>),
        (status = 400, description = "Invalid flower", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse)
    ),
    tag = "Flowers"
)]
pub async fn create_flower(
    State(state): State<AppState>,
    Json(request): Json<CreateFlowerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FlowerModel>>), ServiceError> {
    let flower = state.services.flowers.create_flower(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(flower))))
}

/// Replace a flower's details
#[utoipa::path(
    put,
    path = "/api/v1/flowers/{id}",
    params(("id" = i32, Path, description = "Flower id")),
    request_body = CreateFlowerRequest,
    responses(
        (status = 200, description = "Flower updated", body = crate::ApiResponse<crate::entities::flower::Model>),
        (status = 400, description = "Invalid flower", body = crate::errors::ErrorResponse),
        (status = 404, description = "Flower or category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Flowers"
)]
pub async fn update_flower(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<CreateFlowerRequest>,
) -> ApiResult<FlowerModel> {
    let flower = state.services.flowers.update_flower(id, request).await?;
    Ok(Json(ApiResponse::success(flower)))
}

/// Remove a flower that no order references
#[utoipa::path(
    delete,
    path = "/api/v1/flowers/{id}",
    params(("id" = i32, Path, description = "Flower id")),
    responses(
        (status = 204, description = "Flower deleted"),
        (status = 404, description = "Flower not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Flower is on an order", body = crate::errors::ErrorResponse)
    ),
    tag = "Flowers"
)]
pub async fn delete_flower(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.flowers.delete_flower(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn flower_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flowers).post(create_flower))
        .route(
            "/:id",
            get(get_flower).put(update_flower).delete(delete_flower),
        )
}

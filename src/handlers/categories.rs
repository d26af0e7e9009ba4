use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::get,
    Router,
};

use crate::entities::category::Model as CategoryModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::categories::CreateCategoryRequest;
use crate::{ApiResponse, ApiResult};

/// List categories by name
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "All categories", body = crate::ApiResponse<Vec<crate::entities::category::Model>>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<CategoryModel>> {
    let categories = state.services.categories.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

/// Get one category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category found", body = crate::ApiResponse<crate::entities::category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<CategoryModel> {
    let category = state.services.categories.get_category(id).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// Add a category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = crate::ApiResponse<crate::entities::category::Model>),
        (status = 400, description = "Invalid name", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryModel>>), ServiceError> {
    let category = state.services.categories.create_category(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category))
}

use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::category::{ActiveModel as CategoryActiveModel, Model as CategoryModel},
    errors::ServiceError,
    repositories::CategoryRepository,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1 to 100 characters"))]
    pub name: String,
}

/// Catalog categories used to group flowers on the storefront
#[derive(Clone)]
pub struct CategoryService {
    categories: CategoryRepository,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            categories: CategoryRepository::new(db_pool),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(self.categories.find_all().await?)
    }

    pub async fn get_category(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {} not found", id)))
    }

    /// Names are unique; a duplicate is a conflict.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<CategoryModel, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "category name is required".to_string(),
            ));
        }
        if self.categories.find_by_name(&name).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "category {:?} already exists",
                name
            )));
        }

        let category = self
            .categories
            .create(CategoryActiveModel {
                name: Set(name),
                ..Default::default()
            })
            .await?;

        info!(category_id = category.id, "category created");
        Ok(category)
    }
}

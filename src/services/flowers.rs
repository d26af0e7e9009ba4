use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        flower::{ActiveModel as FlowerActiveModel, Model as FlowerModel, IMAGE_SEPARATOR},
        max_money,
    },
    errors::ServiceError,
    repositories::{CategoryRepository, FlowerFilter, FlowerRepository},
};

/// Flower fields for create and full-replacement update
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFlowerRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[schema(value_type = String, example = "150000")]
    pub price: Decimal,
    pub image_path: Option<String>,
    /// Extra gallery image paths
    #[serde(default)]
    pub additional_images: Vec<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    pub stock: i32,
    pub category_id: Option<i32>,
}

struct CheckedFlower {
    name: String,
    additional_images: Option<String>,
}

/// Catalog lookups and maintenance
#[derive(Clone)]
pub struct FlowerService {
    flowers: FlowerRepository,
    categories: CategoryRepository,
}

impl FlowerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            flowers: FlowerRepository::new(db_pool.clone()),
            categories: CategoryRepository::new(db_pool),
        }
    }

    pub async fn list_flowers(&self, filter: &FlowerFilter) -> Result<Vec<FlowerModel>, ServiceError> {
        Ok(self.flowers.list(filter).await?)
    }

    pub async fn get_flower(&self, id: i32) -> Result<FlowerModel, ServiceError> {
        self.flowers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("flower {} not found", id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_flower(
        &self,
        request: CreateFlowerRequest,
    ) -> Result<FlowerModel, ServiceError> {
        let checked = self.check_request(&request).await?;

        let flower = self
            .flowers
            .create(FlowerActiveModel {
                name: Set(checked.name),
                price: Set(request.price),
                image_path: Set(request.image_path),
                additional_images: Set(checked.additional_images),
                description: Set(request.description),
                stock: Set(request.stock),
                category_id: Set(request.category_id),
                created_at: Set(Utc::now()),
                ..Default::default()
            })
            .await?;

        info!(flower_id = flower.id, "flower created");
        Ok(flower)
    }

    /// Replaces every editable field. Prices already captured on orders are
    /// unaffected.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn update_flower(
        &self,
        id: i32,
        request: CreateFlowerRequest,
    ) -> Result<FlowerModel, ServiceError> {
        let existing = self.get_flower(id).await?;
        let checked = self.check_request(&request).await?;

        let mut active: FlowerActiveModel = existing.into();
        active.name = Set(checked.name);
        active.price = Set(request.price);
        active.image_path = Set(request.image_path);
        active.additional_images = Set(checked.additional_images);
        active.description = Set(request.description);
        active.stock = Set(request.stock);
        active.category_id = Set(request.category_id);

        let flower = self.flowers.update(active).await?;
        info!(flower_id = flower.id, "flower updated");
        Ok(flower)
    }

    /// Flowers that appear on an order cannot be removed.
    #[instrument(skip(self))]
    pub async fn delete_flower(&self, id: i32) -> Result<(), ServiceError> {
        let flower = self.get_flower(id).await?;
        let lines = self.flowers.count_order_lines(&flower).await?;
        if lines > 0 {
            return Err(ServiceError::Conflict(format!(
                "flower {} is referenced by {} order line(s)",
                id, lines
            )));
        }

        self.flowers.delete(flower).await?;
        info!(flower_id = id, "flower deleted");
        Ok(())
    }

    async fn check_request(&self, request: &CreateFlowerRequest) -> Result<CheckedFlower, ServiceError> {
        request.validate()?;
        check_price(request.price)?;

        if let Some(category_id) = request.category_id {
            if self.categories.find_by_id(category_id).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "category {} not found",
                    category_id
                )));
            }
        }

        Ok(CheckedFlower {
            name: request.name.trim().to_string(),
            additional_images: join_images(&request.additional_images)?,
        })
    }
}

/// Prices must fit the money column: 0 to 9,999,999,999,999.99 with at
/// most two decimal places.
fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::ValidationError(
            "price must not be negative".to_string(),
        ));
    }
    if price > max_money() {
        return Err(ServiceError::ValidationError(format!(
            "price must not exceed {}",
            max_money()
        )));
    }
    if price.normalize().scale() > 2 {
        return Err(ServiceError::ValidationError(
            "price allows at most two decimal places".to_string(),
        ));
    }
    Ok(())
}

fn join_images(images: &[String]) -> Result<Option<String>, ServiceError> {
    let mut paths = Vec::with_capacity(images.len());
    for image in images.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if image.contains(IMAGE_SEPARATOR) {
            return Err(ServiceError::ValidationError(format!(
                "image path {:?} must not contain {:?}",
                image, IMAGE_SEPARATOR
            )));
        }
        paths.push(image);
    }
    Ok((!paths.is_empty()).then(|| paths.join(&IMAGE_SEPARATOR.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn price_must_fit_money_column() {
        assert!(check_price(dec!(0)).is_ok());
        assert!(check_price(dec!(9999999999999.99)).is_ok());
        assert!(check_price(dec!(150000.50)).is_ok());
        assert_matches!(check_price(dec!(-1)), Err(ServiceError::ValidationError(_)));
        assert_matches!(
            check_price(dec!(10000000000000)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(check_price(dec!(1.005)), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn gallery_paths_are_joined() {
        assert_eq!(join_images(&[]).unwrap(), None);
        assert_eq!(
            join_images(&[" /a.jpg ".into(), "".into(), "/b.jpg".into()]).unwrap(),
            Some("/a.jpg,/b.jpg".to_string())
        );
        assert_matches!(
            join_images(&["/a.jpg,/b.jpg".into()]),
            Err(ServiceError::ValidationError(_))
        );
    }
}

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;

use crate::entities::category::{
    ActiveModel as CategoryActiveModel, Column, Entity as Category, Model as CategoryModel,
};
use crate::repositories::Repository;

use super::BaseRepository;

/// Repository for flower categories
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    base: BaseRepository,
}

impl CategoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<CategoryModel>, DbErr> {
        Category::find_by_id(id).one(self.base.get_db()).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<CategoryModel>, DbErr> {
        Category::find()
            .filter(Column::Name.eq(name))
            .one(self.base.get_db())
            .await
    }

    pub async fn find_all(&self) -> Result<Vec<CategoryModel>, DbErr> {
        Category::find()
            .order_by_asc(Column::Name)
            .all(self.base.get_db())
            .await
    }

    pub async fn create(&self, category: CategoryActiveModel) -> Result<CategoryModel, DbErr> {
        category.insert(self.base.get_db()).await
    }
}

impl Repository for CategoryRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

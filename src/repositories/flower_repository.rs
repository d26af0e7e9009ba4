use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;

use crate::entities::flower::{
    ActiveModel as FlowerActiveModel, Column, Entity as Flower, Model as FlowerModel,
};
use crate::entities::order_item::Entity as OrderItem;
use crate::repositories::{like_pattern, Repository};

use super::BaseRepository;

/// Optional catalog filters, combined with AND
#[derive(Debug, Clone, Default)]
pub struct FlowerFilter {
    /// Case-insensitive name keyword
    pub search: Option<String>,
    pub category_id: Option<i32>,
}

/// Repository for the flower catalog
#[derive(Debug, Clone)]
pub struct FlowerRepository {
    base: BaseRepository,
}

impl FlowerRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<FlowerModel>, DbErr> {
        Flower::find_by_id(id).one(self.base.get_db()).await
    }

    pub async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<FlowerModel>, DbErr> {
        Flower::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(self.base.get_db())
            .await
    }

    /// Lists the catalog by name.
    pub async fn list(&self, filter: &FlowerFilter) -> Result<Vec<FlowerModel>, DbErr> {
        let mut query = Flower::find();
        if let Some(keyword) = filter.search.as_deref().filter(|k| !k.trim().is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(Column::Name))).like(like_pattern(keyword)),
            );
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(Column::CategoryId.eq(category_id));
        }

        query
            .order_by_asc(Column::Name)
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await
    }

    pub async fn create(&self, flower: FlowerActiveModel) -> Result<FlowerModel, DbErr> {
        flower.insert(self.base.get_db()).await
    }

    pub async fn update(&self, flower: FlowerActiveModel) -> Result<FlowerModel, DbErr> {
        flower.update(self.base.get_db()).await
    }

    /// Number of order lines that reference the flower.
    pub async fn count_order_lines(&self, flower: &FlowerModel) -> Result<u64, DbErr> {
        flower
            .find_related(OrderItem)
            .count(self.base.get_db())
            .await
    }

    pub async fn delete(&self, flower: FlowerModel) -> Result<(), DbErr> {
        flower.delete(self.base.get_db()).await?;
        Ok(())
    }

    /// Reduces stock by `quantity`, never below zero. Runs on the caller's
    /// connection so it can join a settlement transaction.
    ///
    /// A missing flower is an error so the settlement rolls back.
    pub async fn decrement_stock<C>(conn: &C, flower_id: i32, quantity: i32) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let flower = Flower::find_by_id(flower_id)
            .one(conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("flower {} not found", flower_id)))?;

        let remaining = flower.stock.saturating_sub(quantity).max(0);
        let mut active: FlowerActiveModel = flower.into();
        active.stock = Set(remaining);
        active.update(conn).await?;
        Ok(())
    }
}

impl Repository for FlowerRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

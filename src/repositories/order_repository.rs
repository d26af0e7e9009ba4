use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func, Query},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
    TransactionTrait,
};
use std::sync::Arc;

use crate::entities::flower::{self, Entity as Flower};
use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, PaymentStatus,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItem, Model as OrderItemModel,
};
use crate::repositories::{like_pattern, Repository};

use super::BaseRepository;

/// Optional list filters
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<PaymentStatus>,
    /// Case-insensitive keyword matched against customer name, phone and
    /// the names of ordered flowers
    pub search: Option<String>,
}

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<OrderModel>, DbErr> {
        Order::find_by_id(id).one(self.base.get_db()).await
    }

    /// Find an order together with its line items
    pub async fn find_with_items(
        &self,
        id: i32,
    ) -> Result<Option<(OrderModel, Vec<OrderItemModel>)>, DbErr> {
        Self::load_with_items(self.base.get_db(), id).await
    }

    /// Same as [`Self::find_with_items`] on the caller's connection.
    pub async fn load_with_items<C>(
        conn: &C,
        id: i32,
    ) -> Result<Option<(OrderModel, Vec<OrderItemModel>)>, DbErr>
    where
        C: ConnectionTrait,
    {
        let Some(order) = Order::find_by_id(id).one(conn).await? else {
            return Ok(None);
        };
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::Id)
            .all(conn)
            .await?;
        Ok(Some((order, items)))
    }

    fn filtered(filter: &OrderFilter) -> Select<Order> {
        let mut query = Order::find();
        if let Some(status) = filter.status {
            query = query.filter(Column::PaymentStatus.eq(status));
        }
        if let Some(keyword) = filter.search.as_deref().filter(|k| !k.trim().is_empty()) {
            let by_flower = Query::select()
                .column(order_item::Column::OrderId)
                .from(OrderItem)
                .inner_join(
                    Flower,
                    Expr::col((Flower, flower::Column::Id))
                        .equals((OrderItem, order_item::Column::FlowerId)),
                )
                .and_where(
                    Expr::expr(Func::lower(Expr::col((Flower, flower::Column::Name))))
                        .like(like_pattern(keyword)),
                )
                .to_owned();

            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(Column::CustomerName)))
                            .like(like_pattern(keyword)),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(Column::Phone)))
                            .like(like_pattern(keyword)),
                    )
                    .add(Column::Id.in_subquery(by_flower)),
            );
        }
        query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
    }

    /// Newest-first page of orders. `page` is 1-based.
    pub async fn find_all(
        &self,
        filter: &OrderFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<OrderModel>, u64), DbErr> {
        let paginator = Self::filtered(filter).paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    /// Every order matching `filter`, newest first.
    pub async fn find_matching(&self, filter: &OrderFilter) -> Result<Vec<OrderModel>, DbErr> {
        Self::filtered(filter).all(self.base.get_db()).await
    }

    /// Inserts an order and its items in one transaction
    pub async fn create_with_items(
        &self,
        order: OrderActiveModel,
        items: Vec<OrderItemActiveModel>,
    ) -> Result<(OrderModel, Vec<OrderItemModel>), DbErr> {
        let txn = self.base.get_db().begin().await?;

        let order = order.insert(&txn).await?;
        let mut saved = Vec::with_capacity(items.len());
        for mut item in items {
            item.order_id = Set(order.id);
            saved.push(item.insert(&txn).await?);
        }

        txn.commit().await?;
        Ok((order, saved))
    }

    pub async fn update(&self, order: OrderActiveModel) -> Result<OrderModel, DbErr> {
        order.update(self.base.get_db()).await
    }

    /// Removes an order and its line items together
    pub async fn delete_with_items(&self, order: OrderModel) -> Result<(), DbErr> {
        let txn = self.base.get_db().begin().await?;
        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        order.delete(&txn).await?;
        txn.commit().await
    }

    /// Marks the order PAID unless it already is. Returns whether this call
    /// made the transition.
    pub async fn mark_paid<C>(
        conn: &C,
        order_id: i32,
        transaction_id: Option<String>,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let result = Order::update_many()
            .set(OrderActiveModel {
                payment_status: Set(PaymentStatus::Paid),
                transaction_id: Set(transaction_id),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(Column::Id.eq(order_id))
            .filter(Column::PaymentStatus.ne(PaymentStatus::Paid))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Marks the order FAILED. A PAID order is left alone.
    pub async fn mark_failed<C>(conn: &C, order_id: i32) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let result = Order::update_many()
            .set(OrderActiveModel {
                payment_status: Set(PaymentStatus::Failed),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(Column::Id.eq(order_id))
            .filter(Column::PaymentStatus.ne(PaymentStatus::Paid))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

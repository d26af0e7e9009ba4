use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "order_items")]
#[schema(as = OrderItem)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub flower_id: i32,
    pub quantity: i32,
    /// Flower price captured when the order was placed
    #[schema(value_type = String, example = "150000")]
    pub price_at_purchase: Decimal,
    pub selected_style: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::flower::Entity",
        from = "Column::FlowerId",
        to = "super::flower::Column::Id"
    )]
    Flower,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::flower::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flower.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

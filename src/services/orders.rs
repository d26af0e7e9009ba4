use chrono::{Local, NaiveDate};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        max_money,
        order::{self, ActiveModel as OrderActiveModel, PaymentStatus},
        order_item::{self, ActiveModel as OrderItemActiveModel},
    },
    errors::ServiceError,
    repositories::{FlowerRepository, OrderFilter, OrderRepository},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub flower_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub selected_style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 6, max = 32, message = "Phone must be 6 to 32 characters"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub note: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    #[validate]
    pub items: Vec<OrderLineRequest>,
}

/// Editable delivery details. Absent fields keep their current value;
/// payment status and line items are not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub customer_name: Option<String>,
    #[validate(length(min = 6, max = 32, message = "Phone must be 6 to 32 characters"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: Option<String>,
    pub note: Option<String>,
    pub delivery_date: Option<NaiveDate>,
}

/// Orders matching a keyword and the sum of their totals
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncomeSummary {
    pub orders: Vec<order::Model>,
    pub order_count: u64,
    #[schema(value_type = String, example = "450000")]
    pub grand_total: Decimal,
}

/// An order with its line items
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Service for placing and reading orders
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    flowers: FlowerRepository,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            orders: OrderRepository::new(db_pool.clone()),
            flowers: FlowerRepository::new(db_pool),
        }
    }

    /// Places a PENDING order priced at current flower prices. Stock is
    /// checked here but only decremented once payment settles.
    #[instrument(skip(self, request), fields(customer = %request.customer_name, lines = request.items.len()))]
    pub async fn place_order(&self, request: CreateOrderRequest) -> Result<OrderDetails, ServiceError> {
        request.validate()?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one item".to_string(),
            ));
        }

        // Same flower on several lines counts against one stock figure
        let mut requested: BTreeMap<i32, i32> = BTreeMap::new();
        for line in &request.items {
            let entry = requested.entry(line.flower_id).or_insert(0);
            *entry = entry.saturating_add(line.quantity);
        }

        let ids: Vec<i32> = requested.keys().copied().collect();
        let flowers: HashMap<i32, _> = self
            .flowers
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();

        for (flower_id, quantity) in &requested {
            let flower = flowers
                .get(flower_id)
                .ok_or_else(|| ServiceError::NotFound(format!("flower {} not found", flower_id)))?;
            if *quantity > flower.stock {
                return Err(ServiceError::InsufficientStock(format!(
                    "{}: requested {}, available {}",
                    flower.name, quantity, flower.stock
                )));
            }
        }

        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(request.items.len());
        for line in request.items {
            // Presence checked above
            let Some(flower) = flowers.get(&line.flower_id) else {
                continue;
            };
            total = flower
                .price
                .checked_mul(Decimal::from(line.quantity))
                .and_then(|line_total| total.checked_add(line_total))
                .filter(|sum| *sum <= max_money())
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "order total exceeds {}",
                        max_money()
                    ))
                })?;
            items.push(OrderItemActiveModel {
                flower_id: Set(flower.id),
                quantity: Set(line.quantity),
                price_at_purchase: Set(flower.price),
                selected_style: Set(line.selected_style),
                ..Default::default()
            });
        }

        let order = OrderActiveModel {
            customer_name: Set(request.customer_name.trim().to_string()),
            phone: Set(request.phone.trim().to_string()),
            address: Set(request.address.trim().to_string()),
            note: Set(request.note),
            payment_status: Set(PaymentStatus::Pending),
            transaction_id: Set(None),
            order_date: Set(Local::now().date_naive()),
            delivery_date: Set(request.delivery_date),
            total_amount: Set(total),
            updated_at: Set(None),
            ..Default::default()
        };

        let (order, items) = self.orders.create_with_items(order, items).await?;

        counter!("flower_shop.orders.placed", 1);
        info!(order_id = order.id, total = %order.total_amount, "order placed");

        Ok(OrderDetails { order, items })
    }

    pub async fn get_order(&self, id: i32) -> Result<OrderDetails, ServiceError> {
        self.orders
            .find_with_items(id)
            .await?
            .map(|(order, items)| OrderDetails { order, items })
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", id)))
    }

    /// Returns one page of orders and the total number matching `filter`.
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        Ok(self.orders.find_all(filter, page.max(1), per_page.max(1)).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        id: i32,
        request: UpdateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        request.validate()?;
        let existing = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", id)))?;

        let mut active: OrderActiveModel = existing.into();
        if let Some(name) = request.customer_name {
            active.customer_name = Set(required(name, "customer name")?);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(required(phone, "phone")?);
        }
        if let Some(address) = request.address {
            active.address = Set(required(address, "address")?);
        }
        if let Some(note) = request.note {
            active.note = Set(Some(note).filter(|n| !n.trim().is_empty()));
        }
        if let Some(date) = request.delivery_date {
            active.delivery_date = Set(Some(date));
        }

        let order = self.orders.update(active).await?;
        info!(order_id = order.id, "order updated");
        Ok(order)
    }

    /// Deletes the order and its lines. Stock is not restored.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: i32) -> Result<(), ServiceError> {
        let order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", id)))?;
        self.orders.delete_with_items(order).await?;
        info!(order_id = id, "order deleted");
        Ok(())
    }

    /// Sums `total_amount` over every order matching `filter`.
    pub async fn income_summary(&self, filter: &OrderFilter) -> Result<IncomeSummary, ServiceError> {
        let orders = self.orders.find_matching(filter).await?;
        let grand_total = orders
            .iter()
            .try_fold(Decimal::ZERO, |sum, order| sum.checked_add(order.total_amount))
            .ok_or_else(|| ServiceError::ValidationError("grand total overflows".to_string()))?;

        Ok(IncomeSummary {
            order_count: orders.len() as u64,
            orders,
            grand_total,
        })
    }
}

fn required(value: String, field: &str) -> Result<String, ServiceError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(value)
}

//! Business logic used by HTTP handlers.

pub mod categories;
pub mod flowers;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use crate::db::DbPool;
use crate::gateway::VnPayGateway;

/// Services layer container shared through `AppState`
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<categories::CategoryService>,
    pub flowers: Arc<flowers::FlowerService>,
    pub orders: Arc<orders::OrderService>,
    pub payments: Arc<payments::PaymentService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, gateway: VnPayGateway) -> Self {
        Self {
            categories: Arc::new(categories::CategoryService::new(db_pool.clone())),
            flowers: Arc::new(flowers::FlowerService::new(db_pool.clone())),
            orders: Arc::new(orders::OrderService::new(db_pool.clone())),
            payments: Arc::new(payments::PaymentService::new(db_pool, gateway)),
        }
    }
}

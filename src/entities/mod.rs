//! Database entities.

pub mod category;
pub mod flower;
pub mod order;
pub mod order_item;

pub use order::PaymentStatus;

use rust_decimal::Decimal;

/// Largest amount a `DECIMAL(15, 2)` money column holds.
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999_999, 2)
}

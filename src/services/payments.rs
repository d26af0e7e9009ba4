use metrics::counter;
use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::order::{Entity as Order, Model as OrderModel, PaymentStatus},
    errors::ServiceError,
    gateway::{
        vnpay::{fields, to_minor_units, FIELD_PREFIX, RESPONSE_CODE_SUCCESS},
        ParameterSet, PaymentRequest, VnPayGateway,
    },
    repositories::{FlowerRepository, OrderRepository},
};

/// Shop-owned query parameter appended to the gateway return URL.
pub const ORDER_ID_PARAM: &str = "orderId";

/// Outcome of processing a gateway return callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentResult {
    pub order_id: i32,
    pub status: PaymentStatus,
    /// True when the order is paid after this callback
    pub success: bool,
    pub transaction_id: Option<String>,
    pub message: String,
}

impl PaymentResult {
    fn from_order(order: &OrderModel, message: impl Into<String>) -> Self {
        Self {
            order_id: order.id,
            status: order.payment_status,
            success: order.is_paid(),
            transaction_id: order.transaction_id.clone(),
            message: message.into(),
        }
    }
}

/// Why a callback did not settle the order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    InvalidSignature,
    Declined(String),
    AmountMismatch { expected: i64, received: Option<String> },
}

impl Rejection {
    fn message(&self) -> String {
        match self {
            Rejection::InvalidSignature => "invalid payment signature".to_string(),
            Rejection::Declined(code) => format!("payment declined by gateway (code {})", code),
            Rejection::AmountMismatch { expected, received } => format!(
                "paid amount {} does not match order total {}",
                received.as_deref().unwrap_or("(missing)"),
                expected
            ),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Rejection::InvalidSignature => "invalid_signature",
            Rejection::Declined(_) => "declined",
            Rejection::AmountMismatch { .. } => "amount_mismatch",
        }
    }
}

/// Checkout and callback settlement against the VNPay gateway
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    orders: OrderRepository,
    gateway: VnPayGateway,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, gateway: VnPayGateway) -> Self {
        Self {
            orders: OrderRepository::new(db_pool.clone()),
            db_pool,
            gateway,
        }
    }

    /// Signed redirect URL charging the order's total.
    #[instrument(skip(self, client_ip))]
    pub async fn checkout_url(
        &self,
        order_id: i32,
        client_ip: Option<String>,
    ) -> Result<String, ServiceError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        if order.is_paid() {
            return Err(ServiceError::Conflict(format!(
                "order {} is already paid",
                order_id
            )));
        }

        let request = PaymentRequest {
            order_id: order.id,
            amount: order.total_amount,
            order_info: format!("Thanh toan don hang {}", order.id),
            client_ip,
        };

        let url = self.gateway.build_payment_url(&request).map_err(|err| {
            warn!(order_id, error = %err, "could not build payment url");
            counter!("flower_shop.payments.url_failures", 1);
            ServiceError::from(err)
        })?;

        counter!("flower_shop.payments.url_created", 1);
        info!(order_id, amount = %order.total_amount, "payment url created");
        Ok(url)
    }

    /// Settles an order from the gateway return callback.
    ///
    /// The order is re-read and updated inside one transaction, and the
    /// status change only applies to an order that is not yet PAID. Of any
    /// number of callbacks for the same order, exactly one decrements stock.
    /// Anything short of a correctly signed, approved payment for the full
    /// amount marks the order FAILED.
    #[instrument(skip(self, params), fields(param_count = params.len()))]
    pub async fn handle_return(&self, params: &ParameterSet) -> Result<PaymentResult, ServiceError> {
        let order_id = parse_order_id(params)?;
        let signed = params.with_prefix(FIELD_PREFIX);

        let txn = self.db_pool.begin().await?;
        let (order, items) = OrderRepository::load_with_items(&txn, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        if order.is_paid() {
            txn.commit().await?;
            info!(order_id, "callback for an already paid order ignored");
            return Ok(PaymentResult::from_order(&order, "order already paid"));
        }

        if let Some(rejection) = self.check_callback(&order, &signed)? {
            warn!(order_id, reason = rejection.label(), ?rejection, "payment callback rejected");
            counter!("flower_shop.payments.callbacks", 1, "outcome" => rejection.label());
            OrderRepository::mark_failed(&txn, order_id).await?;
            let order = reload_order(&txn, order_id).await?;
            txn.commit().await?;
            return Ok(PaymentResult::from_order(&order, rejection.message()));
        }

        let transaction_id = signed
            .get(fields::TRANSACTION_NO)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        if !OrderRepository::mark_paid(&txn, order_id, transaction_id).await? {
            // Settled by a concurrent callback since the read above
            let order = reload_order(&txn, order_id).await?;
            txn.commit().await?;
            info!(order_id, "order settled by a concurrent callback");
            return Ok(PaymentResult::from_order(&order, "order already paid"));
        }
        for item in &items {
            FlowerRepository::decrement_stock(&txn, item.flower_id, item.quantity).await?;
        }
        let order = reload_order(&txn, order_id).await?;
        txn.commit().await?;

        counter!("flower_shop.payments.callbacks", 1, "outcome" => "paid");
        info!(order_id, transaction_id = ?order.transaction_id, "order paid");
        Ok(PaymentResult::from_order(&order, "payment successful"))
    }

    fn check_callback(
        &self,
        order: &OrderModel,
        signed: &ParameterSet,
    ) -> Result<Option<Rejection>, ServiceError> {
        if !self.gateway.verify_callback(signed) {
            return Ok(Some(Rejection::InvalidSignature));
        }

        let code = signed.get(fields::RESPONSE_CODE).unwrap_or_default();
        if code != RESPONSE_CODE_SUCCESS {
            return Ok(Some(Rejection::Declined(code.to_string())));
        }

        let expected = to_minor_units(order.total_amount)?;
        let received = signed.get(fields::AMOUNT);
        if received.and_then(|v| v.parse::<i64>().ok()) != Some(expected) {
            return Ok(Some(Rejection::AmountMismatch {
                expected,
                received: received.map(str::to_string),
            }));
        }

        Ok(None)
    }
}

async fn reload_order<C>(conn: &C, order_id: i32) -> Result<OrderModel, ServiceError>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))
}

fn parse_order_id(params: &ParameterSet) -> Result<i32, ServiceError> {
    let raw = params
        .get(ORDER_ID_PARAM)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::NotFound("callback does not name an order".to_string()))?;
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::InvalidInput(format!("invalid order id {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn order_id_is_read_from_shop_parameter() {
        let params: ParameterSet = [(ORDER_ID_PARAM, "17"), ("vnp_Amount", "100")]
            .into_iter()
            .collect();
        assert_eq!(parse_order_id(&params).unwrap(), 17);
    }

    #[test]
    fn missing_order_id_is_not_found() {
        let params: ParameterSet = [("vnp_Amount", "100")].into_iter().collect();
        assert_matches!(parse_order_id(&params), Err(ServiceError::NotFound(_)));
    }

    #[test]
    fn malformed_order_id_is_invalid_input() {
        let params: ParameterSet = [(ORDER_ID_PARAM, "abc")].into_iter().collect();
        assert_matches!(parse_order_id(&params), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn rejection_messages_are_user_facing() {
        assert_eq!(
            Rejection::Declined("24".into()).message(),
            "payment declined by gateway (code 24)"
        );
        assert_eq!(Rejection::InvalidSignature.label(), "invalid_signature");
    }
}

use chrono::{Local, NaiveDateTime};
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sha2::Sha512;
use std::sync::Arc;
use tracing::{debug, warn};

use super::params::{ParameterSet, SECURE_HASH, SECURE_HASH_TYPE};
use super::GatewayError;
use crate::config::VnPayConfig;

type HmacSha512 = Hmac<Sha512>;

/// `vnp_CreateDate` layout.
pub const CREATE_DATE_FORMAT: &str = "%Y%m%d%H%M%S";
/// `vnp_ResponseCode` value reported for a completed payment.
pub const RESPONSE_CODE_SUCCESS: &str = "00";
/// Prefix shared by every field the gateway signs.
pub const FIELD_PREFIX: &str = "vnp_";

pub mod fields {
    pub const VERSION: &str = "vnp_Version";
    pub const COMMAND: &str = "vnp_Command";
    pub const TMN_CODE: &str = "vnp_TmnCode";
    pub const AMOUNT: &str = "vnp_Amount";
    pub const CURR_CODE: &str = "vnp_CurrCode";
    pub const TXN_REF: &str = "vnp_TxnRef";
    pub const ORDER_INFO: &str = "vnp_OrderInfo";
    pub const ORDER_TYPE: &str = "vnp_OrderType";
    pub const LOCALE: &str = "vnp_Locale";
    pub const RETURN_URL: &str = "vnp_ReturnUrl";
    pub const IP_ADDR: &str = "vnp_IpAddr";
    pub const CREATE_DATE: &str = "vnp_CreateDate";
    pub const RESPONSE_CODE: &str = "vnp_ResponseCode";
    pub const TRANSACTION_NO: &str = "vnp_TransactionNo";
}

/// What the shop wants to charge for.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: i32,
    /// Major currency units.
    pub amount: Decimal,
    pub order_info: String,
    /// Falls back to the configured default when absent.
    pub client_ip: Option<String>,
}

/// Signs outbound payment URLs and verifies gateway callbacks.
///
/// Holds only immutable configuration; clones share it.
#[derive(Clone)]
pub struct VnPayGateway {
    config: Arc<VnPayConfig>,
}

impl VnPayGateway {
    pub fn new(config: VnPayConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &VnPayConfig {
        &self.config
    }

    /// Builds a redirect URL stamped with the current local time; the
    /// transaction reference is the current epoch milliseconds.
    pub fn build_payment_url(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        let now = Local::now();
        let txn_ref = now.timestamp_millis().to_string();
        self.build_payment_url_at(request, now.naive_local(), &txn_ref)
    }

    /// Deterministic variant of [`build_payment_url`](Self::build_payment_url).
    pub fn build_payment_url_at(
        &self,
        request: &PaymentRequest,
        created_at: NaiveDateTime,
        txn_ref: &str,
    ) -> Result<String, GatewayError> {
        let params = self.payment_params(request, created_at, txn_ref)?;
        self.signed_url(&params)
    }

    /// The unsigned parameter set for a payment.
    pub fn payment_params(
        &self,
        request: &PaymentRequest,
        created_at: NaiveDateTime,
        txn_ref: &str,
    ) -> Result<ParameterSet, GatewayError> {
        let cfg = &self.config;
        let amount = to_minor_units(request.amount)?;
        let client_ip = request
            .client_ip
            .clone()
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or_else(|| cfg.default_ip_addr.clone());

        let mut params = ParameterSet::new();
        params
            .insert(fields::VERSION, cfg.version.as_str())
            .insert(fields::COMMAND, cfg.command.as_str())
            .insert(fields::TMN_CODE, cfg.tmn_code.as_str())
            .insert(fields::AMOUNT, amount.to_string())
            .insert(fields::CURR_CODE, cfg.currency.as_str())
            .insert(fields::TXN_REF, txn_ref)
            .insert(fields::ORDER_INFO, request.order_info.as_str())
            .insert(fields::ORDER_TYPE, cfg.order_type.as_str())
            .insert(fields::LOCALE, cfg.locale.as_str())
            .insert(fields::RETURN_URL, self.return_url_for(request.order_id))
            .insert(fields::IP_ADDR, client_ip)
            .insert(
                fields::CREATE_DATE,
                created_at.format(CREATE_DATE_FORMAT).to_string(),
            );
        Ok(params)
    }

    /// `base_url?query&vnp_SecureHash=signature`
    pub fn signed_url(&self, params: &ParameterSet) -> Result<String, GatewayError> {
        let query = params.query_string()?;
        let signature = self.sign(params)?;
        Ok(format!(
            "{}?{}&{}={}",
            self.config.url, query, SECURE_HASH, signature
        ))
    }

    /// Lowercase hex HMAC-SHA512 over the hash-data string. Signature
    /// fields already present in `params` are ignored.
    pub fn sign(&self, params: &ParameterSet) -> Result<String, GatewayError> {
        let mut unsigned = params.clone();
        unsigned.remove(SECURE_HASH);
        unsigned.remove(SECURE_HASH_TYPE);
        let hash_data = unsigned.hash_data()?;
        debug!(hash_data = %hash_data, "signing gateway parameters");
        hmac_sha512_hex(&self.config.secret_key, &hash_data)
    }

    /// True when `vnp_SecureHash` matches the signature recomputed over the
    /// remaining fields. Never panics or errors; any failure is `false`.
    pub fn verify_callback(&self, params: &ParameterSet) -> bool {
        let mut fields = params.clone();
        let Some(received) = fields.remove(SECURE_HASH) else {
            warn!("callback carries no {}", SECURE_HASH);
            return false;
        };
        fields.remove(SECURE_HASH_TYPE);

        let expected = match fields
            .hash_data()
            .and_then(|data| hmac_sha512_hex(&self.config.secret_key, &data))
        {
            Ok(expected) => expected,
            Err(err) => {
                warn!(error = %err, "could not recompute callback signature");
                return false;
            }
        };

        signatures_match(&expected, &received)
    }

    fn return_url_for(&self, order_id: i32) -> String {
        let base = &self.config.return_url;
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}orderId={}", base, separator, order_id)
    }
}

/// Major units × 100, rounded half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(GatewayError::InvalidAmount(format!(
            "amount must not be negative, got {}",
            amount
        )));
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| GatewayError::InvalidAmount(format!("amount {} is out of range", amount)))
}

pub fn hmac_sha512_hex(key: &str, data: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes())
        .map_err(|e| GatewayError::InvalidKey(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time, ASCII case-insensitive comparison of hex signatures.
fn signatures_match(expected: &str, received: &str) -> bool {
    if expected.len() != received.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in expected.bytes().zip(received.bytes()) {
        diff |= x.to_ascii_lowercase() ^ y.to_ascii_lowercase();
    }
    diff == 0
}

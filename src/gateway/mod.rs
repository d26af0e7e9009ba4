//! Payment gateway integration.
//!
//! `params` holds the canonical parameter encoding shared by signing and
//! verification; `vnpay` builds signed redirect URLs and checks callback
//! signatures.

pub mod params;
pub mod vnpay;

pub use params::{ParameterSet, SECURE_HASH, SECURE_HASH_TYPE};
pub use vnpay::{PaymentRequest, VnPayGateway};

use thiserror::Error;

/// Errors raised while preparing a gateway request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot encode parameter {field}: {reason}")]
    Encoding { field: String, reason: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

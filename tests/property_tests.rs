//! Property-based tests for gateway signing.
//!
//! These tests use proptest to verify signing invariants across a wide range
//! of parameter sets.

use flower_shop_api::config::VnPayConfig;
use flower_shop_api::gateway::{vnpay::to_minor_units, ParameterSet, VnPayGateway, SECURE_HASH};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn gateway(secret: &str) -> VnPayGateway {
    VnPayGateway::new(VnPayConfig {
        url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        tmn_code: "DEMO1234".into(),
        secret_key: secret.into(),
        return_url: "http://localhost:8080/api/v1/payments/vnpay/return".into(),
        ..VnPayConfig::default()
    })
}

// Strategies for generating test data
fn field_name_strategy() -> impl Strategy<Value = String> {
    "vnp_[A-Za-z]{1,12}".prop_filter("not a signature field", |name| {
        name != "vnp_SecureHash" && name != "vnp_SecureHashType"
    })
}

/// Printable ASCII, including characters that need percent-encoding.
fn value_strategy() -> impl Strategy<Value = String> {
    "[ -~]{1,24}"
}

fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 1..12)
        .prop_map(|map| map.into_iter().collect())
}

fn signed(gw: &VnPayGateway, fields: &[(String, String)]) -> ParameterSet {
    let mut params: ParameterSet = fields.iter().cloned().collect();
    let signature = gw.sign(&params).unwrap();
    params.insert(SECURE_HASH, signature);
    params
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn verify_accepts_what_sign_produced(fields in params_strategy()) {
        let gw = gateway("SECRET");
        prop_assert!(gw.verify_callback(&signed(&gw, &fields)));
    }

    #[test]
    fn changing_any_value_breaks_the_signature(
        fields in params_strategy(),
        index in any::<prop::sample::Index>(),
        replacement in value_strategy(),
    ) {
        let gw = gateway("SECRET");
        let mut params = signed(&gw, &fields);
        let (name, original) = &fields[index.index(fields.len())];
        prop_assume!(original != &replacement);

        params.insert(name.clone(), replacement);
        prop_assert!(!gw.verify_callback(&params));
    }

    #[test]
    fn hash_data_ignores_insertion_order(fields in params_strategy()) {
        let forward: ParameterSet = fields.iter().cloned().collect();
        let backward: ParameterSet = fields.iter().rev().cloned().collect();
        prop_assert_eq!(forward.hash_data().unwrap(), backward.hash_data().unwrap());
    }

    #[test]
    fn other_keys_never_verify(fields in params_strategy(), key in "[A-Z0-9]{8,32}") {
        prop_assume!(key != "SECRET");
        let params = signed(&gateway("SECRET"), &fields);
        prop_assert!(!gateway(&key).verify_callback(&params));
    }

    #[test]
    fn empty_values_appear_in_neither_string(
        fields in params_strategy(),
        empty_name in field_name_strategy(),
    ) {
        let mut params: ParameterSet = fields.iter().cloned().collect();
        prop_assume!(!params.contains(&empty_name));
        params.insert(empty_name.clone(), "");

        let needle = format!("{}=", empty_name);
        let hash_data = params.hash_data().unwrap();
        prop_assert!(!hash_data.split('&').any(|pair| pair == needle));
        let query = params.query_string().unwrap();
        prop_assert!(!query.split('&').any(|pair| pair == needle));
    }

    #[test]
    fn signature_is_lowercase_hex_of_fixed_length(fields in params_strategy()) {
        let sig = gateway("SECRET").sign(&fields.into_iter().collect()).unwrap();
        prop_assert_eq!(sig.len(), 128);
        prop_assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn whole_amounts_scale_by_one_hundred(major in 0i64..10_000_000_000) {
        prop_assert_eq!(to_minor_units(Decimal::from(major)).unwrap(), major * 100);
    }
}

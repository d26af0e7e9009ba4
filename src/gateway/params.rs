use std::collections::BTreeMap;

use super::GatewayError;

/// Name of the signature field appended to outbound URLs and returned on callbacks.
pub const SECURE_HASH: &str = "vnp_SecureHash";
/// Optional hash-algorithm hint some gateway versions send alongside the signature.
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Gateway request parameters keyed by name.
///
/// Backed by a `BTreeMap`, so iteration is always in byte-wise name order
/// regardless of insertion order. Empty values may be stored but are
/// skipped when rendering either canonical string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterSet {
    fields: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy containing only fields whose name starts with `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        self.fields
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The string the signature is computed over: `name=enc(value)` pairs
    /// joined by `&`. Names are emitted verbatim.
    pub fn hash_data(&self) -> Result<String, GatewayError> {
        self.render(|name| Ok(name.to_string()))
    }

    /// The string placed in the outbound URL: `enc(name)=enc(value)` pairs
    /// joined by `&`.
    pub fn query_string(&self) -> Result<String, GatewayError> {
        self.render(|name| encode_component(name, name))
    }

    fn render<F>(&self, name_fn: F) -> Result<String, GatewayError>
    where
        F: Fn(&str) -> Result<String, GatewayError>,
    {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for (name, value) in self.non_empty() {
            pairs.push(format!("{}={}", name_fn(name)?, encode_component(name, value)?));
        }
        Ok(pairs.join("&"))
    }

    fn non_empty(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, value)| !value.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// `application/x-www-form-urlencoded` encoding restricted to ASCII input.
///
/// Alphanumerics and `*-._` pass through, space becomes `+`, every other
/// byte is `%XX`. Text outside ASCII cannot be represented by the gateway
/// charset and is rejected instead of being silently replaced.
pub fn encode_component(field: &str, value: &str) -> Result<String, GatewayError> {
    if let Some(offending) = value.chars().find(|c| !c.is_ascii()) {
        return Err(GatewayError::Encoding {
            field: field.to_string(),
            reason: format!("character {:?} is not representable in US-ASCII", offending),
        });
    }
    Ok(url::form_urlencoded::byte_serialize(value.as_bytes()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("Thanh toan don hang 12", "Thanh+toan+don+hang+12")]
    #[case("http://localhost:8080/return?orderId=7", "http%3A%2F%2Flocalhost%3A8080%2Freturn%3ForderId%3D7")]
    #[case("a*b-c.d_e", "a*b-c.d_e")]
    #[case("100%", "100%25")]
    #[case("x~y", "x%7Ey")]
    fn encodes_like_form_urlencoding(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(encode_component("f", input).unwrap(), expected);
    }

    #[test]
    fn rejects_non_ascii_values() {
        let err = encode_component("vnp_OrderInfo", "Thanh toán").unwrap_err();
        assert_matches!(err, GatewayError::Encoding { ref field, .. } if field == "vnp_OrderInfo");
    }

    #[test]
    fn hash_data_is_sorted_and_skips_empty_values() {
        let mut params = ParameterSet::new();
        params
            .insert("vnp_TxnRef", "1000")
            .insert("vnp_BankCode", "")
            .insert("vnp_Amount", "15000000");

        assert_eq!(
            params.hash_data().unwrap(),
            "vnp_Amount=15000000&vnp_TxnRef=1000"
        );
        assert_eq!(
            params.query_string().unwrap(),
            "vnp_Amount=15000000&vnp_TxnRef=1000"
        );
    }

    #[test]
    fn query_string_encodes_names_but_hash_data_does_not() {
        let params: ParameterSet = [("a b", "c d")].into_iter().collect();
        assert_eq!(params.hash_data().unwrap(), "a b=c+d");
        assert_eq!(params.query_string().unwrap(), "a+b=c+d");
    }

    #[test]
    fn uppercase_sorts_before_lowercase() {
        let params: ParameterSet = [("vnp_amount", "1"), ("vnp_Amount", "2"), ("vnp_IpAddr", "3")]
            .into_iter()
            .collect();
        assert_eq!(
            params.hash_data().unwrap(),
            "vnp_Amount=2&vnp_IpAddr=3&vnp_amount=1"
        );
    }

    #[test]
    fn with_prefix_keeps_only_gateway_fields() {
        let params: ParameterSet = [("orderId", "4"), ("vnp_TxnRef", "1")].into_iter().collect();
        let gateway = params.with_prefix("vnp_");
        assert_eq!(gateway.len(), 1);
        assert!(gateway.contains("vnp_TxnRef"));
        assert!(params.contains("orderId"));
    }

    #[test]
    fn empty_set_renders_empty_strings() {
        let params = ParameterSet::new();
        assert_eq!(params.hash_data().unwrap(), "");
        assert!(params.is_empty());
    }
}

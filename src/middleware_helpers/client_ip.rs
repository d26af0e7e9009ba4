use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Client address as reported by a fronting proxy.
///
/// Takes the first `X-Forwarded-For` entry, then `X-Real-IP`. `None` when
/// neither header carries a value; callers substitute their own default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let forwarded = header(FORWARDED_FOR).and_then(|raw| {
            raw.split(',')
                .map(str::trim)
                .find(|entry| !entry.is_empty())
                .map(str::to_string)
        });

        let real_ip = || {
            header(REAL_IP)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        ClientIp(forwarded.or_else(real_ip))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_parts(parts))
    }
}

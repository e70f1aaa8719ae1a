//! Best-effort client metadata taken from proxy headers.
//!
//! Everything here is client-supplied and untrusted: use it for coarse rate
//! limiting and audit context only, never for authorization.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

/// Sentinel for any client field that could not be determined.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: client_ip(headers),
            user_agent: header_str(headers, USER_AGENT.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| UNKNOWN.to_owned()),
        }
    }

    pub fn unknown() -> Self {
        Self {
            ip: UNKNOWN.to_owned(),
            user_agent: UNKNOWN.to_owned(),
        }
    }
}

/// First hop of `x-forwarded-for`, else `x-real-ip`, else [`UNKNOWN`].
pub fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").map(str::trim))
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN)
        .to_owned()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let info = Self::from_headers(&parts.headers);
        async move { Ok(info) }
    }
}

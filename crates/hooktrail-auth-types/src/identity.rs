//! Gateway-injected identity headers → administrator [`Actor`].

use axum::extract::{FromRef, FromRequestParts};
use http::HeaderMap;
use http::request::Parts;
use uuid::Uuid;

use hooktrail_core::error::AppError;

use crate::actor::Actor;

pub const X_USER_ID: &str = "x-hooktrail-user-id";
pub const X_USER_ROLE: &str = "x-hooktrail-user-role";
pub const X_USER_EMAIL: &str = "x-hooktrail-user-email";

/// Minimum role value granting access to administrative endpoints.
pub const ADMIN_ROLE: u8 = 2;

/// Service-level switch for the development bypass.
///
/// With `local_bypass`, a request carrying no identity headers at all is
/// accepted as [`Actor::System`]. Requests that do carry headers are always
/// checked normally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminPolicy {
    pub local_bypass: bool,
}

/// An authorized administrator (or the system bypass actor).
///
/// Rejects with 401 when `x-hooktrail-user-id` / `x-hooktrail-user-role` are
/// absent or malformed, and 403 when the role is below [`ADMIN_ROLE`].
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Actor);

/// Resolve the administrator actor for a request.
pub fn require_admin(headers: &HeaderMap, policy: AdminPolicy) -> Result<Actor, AppError> {
    let raw_id = headers.get(X_USER_ID);
    if raw_id.is_none() && policy.local_bypass {
        tracing::debug!("admin identity resolved through local bypass");
        return Ok(Actor::System);
    }

    let user_id = raw_id
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok())
        .ok_or(AppError::Unauthorized)?;

    let role = headers
        .get(X_USER_ROLE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or(AppError::Unauthorized)?;

    if role < ADMIN_ROLE {
        return Err(AppError::Forbidden);
    }

    let email = headers
        .get(X_USER_EMAIL)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    Ok(Actor::Human { id: user_id, email })
}

impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
    AdminPolicy: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let resolved = require_admin(&parts.headers, AdminPolicy::from_ref(state)).map(Self);
        async move { resolved }
    }
}

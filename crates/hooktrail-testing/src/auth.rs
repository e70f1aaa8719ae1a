//! Mock gateway identity.
//!
//! Services behind the gateway receive `x-hooktrail-user-*` headers. In tests,
//! `MockAdmin` produces those headers directly so no real gateway is needed.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use hooktrail_auth_types::identity::{ADMIN_ROLE, X_USER_EMAIL, X_USER_ID, X_USER_ROLE};

/// Configurable identity injected into test requests.
pub struct MockAdmin {
    pub user_id: Uuid,
    pub role: u8,
    pub email: String,
}

impl MockAdmin {
    /// An administrator with a fresh id.
    pub fn admin() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            role: ADMIN_ROLE,
            email: "ops@example.com".to_owned(),
        }
    }

    /// A signed-in user below the admin role.
    pub fn regular_user() -> Self {
        Self {
            role: 0,
            ..Self::admin()
        }
    }

    /// Return headers as if the gateway injected them.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(X_USER_ID),
            HeaderValue::from_str(&self.user_id.to_string()).unwrap(),
        );
        map.insert(
            HeaderName::from_static(X_USER_ROLE),
            HeaderValue::from_str(&self.role.to_string()).unwrap(),
        );
        map.insert(
            HeaderName::from_static(X_USER_EMAIL),
            HeaderValue::from_str(&self.email).unwrap(),
        );
        map
    }
}

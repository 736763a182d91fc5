//! Sessions
//!
//! Records persisted for signed-in customers and admins, and the gate that
//! decides from them whether a protected view may render.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub mod gate;
pub mod watcher;

/// The signed-in customer as returned by the storefront API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User identifier.
    #[serde(alias = "_id")]
    pub id: String,

    /// Full name.
    pub fullname: String,

    /// Email address.
    pub email: String,

    /// Role name (e.g., "user", "admin").
    #[serde(default)]
    pub role: String,

    /// Contact number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Credentials created by a successful login, registration or OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Opaque token, validated only by the storefront API.
    pub token: String,

    /// The signed-in user.
    pub user: SessionUser,
}

/// The signed-in admin, stamped with the time of sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    /// Admin identifier.
    #[serde(alias = "_id")]
    pub id: String,

    /// Email address.
    pub email: String,

    /// Full name.
    #[serde(default)]
    pub fullname: String,

    /// When the admin signed in.
    #[serde(rename = "loginTime")]
    pub login_at: Timestamp,
}

impl AdminUser {
    /// Create an admin record signed in at `login_at`.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        fullname: impl Into<String>,
        login_at: Timestamp,
    ) -> Self {
        AdminUser {
            id: id.into(),
            email: email.into(),
            fullname: fullname.into(),
            login_at,
        }
    }
}

//! Session token bundle and user profile types.
//!
//! An [`AuthBundle`] is the unit the backend hands out on login and refresh:
//! both tokens, the expiry instant, and the user profile. The session is
//! always replaced wholesale with a new bundle, never patched field by field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Well-known role names used by the backend.
pub mod role {
    pub const ADMIN: &str = "ADMIN";
    pub const MANAGER: &str = "MANAGER";
    pub const USER: &str = "USER";
}

/// User profile as issued by the backend.
///
/// Treated as opaque apart from the role list; unrecognized fields are
/// preserved in `extra` so a round trip through storage loses nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Create a profile with the given username and roles (tests, fixtures).
    pub fn new(username: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            username: username.into(),
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            extra: serde_json::Map::new(),
        }
    }

    /// Whether the profile carries at least one of the allowed roles.
    #[must_use]
    pub fn has_any_role(&self, allowed: &HashSet<String>) -> bool {
        self.roles.iter().any(|r| allowed.contains(r))
    }
}

/// A complete authenticated session as issued by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthBundle {
    /// Access token sent as the bearer credential.
    pub access_token: String,

    /// Refresh token presented to the refresh endpoint.
    pub refresh_token: String,

    /// Token scheme, typically "Bearer".
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Instant at which the access token stops being accepted.
    pub expires_at: DateTime<Utc>,

    /// Profile of the authenticated user.
    pub user: UserProfile,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AuthBundle {
    /// Create a bundle with an absolute expiry instant.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        user: UserProfile,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expires_at,
            user,
        }
    }

    /// Create a bundle expiring `expires_in` seconds from now.
    pub fn with_expires_in(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
        user: UserProfile,
    ) -> Self {
        Self::new(
            access_token,
            refresh_token,
            Utc::now() + chrono::Duration::seconds(expires_in),
            user,
        )
    }

    /// Check if the access token has passed its expiry instant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token is inside the refresh window: expired, or due to
    /// expire within `buffer`.
    #[must_use]
    pub fn needs_refresh(&self, buffer: chrono::Duration) -> bool {
        within_refresh_window(self.expires_at, buffer)
    }

    /// Duration until expiry, or `Duration::ZERO` once past it.
    pub fn time_until_expiry(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Check whether an expiry instant is inside the refresh window.
///
/// Shared by [`AuthBundle::needs_refresh`] and the session manager, which
/// reads the instant straight out of the credential store.
#[must_use]
pub fn within_refresh_window(expires_at: DateTime<Utc>, buffer: chrono::Duration) -> bool {
    Utc::now() >= expires_at - buffer
}

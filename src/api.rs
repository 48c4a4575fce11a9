//! Backend auth API.
//!
//! Wire contract for the session endpoints. All payloads are camelCase JSON.
//! `POST /login` and `POST /refresh-token` return a session payload that is
//! converted into an [`AuthBundle`]; `POST /register` only creates the
//! account and returns the new profile, it does not establish a session.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EndpointsConfig;
use crate::error::AuthError;
use crate::net::ApiClient;
use crate::net::client::api_error;
use crate::session::token::{AuthBundle, UserProfile};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Credentials for `POST /login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload for `POST /register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Token pair presented to `POST /refresh-token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session payload returned by `/login` and `/refresh-token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Token lifetime in seconds, relative to receipt.
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Absolute expiry instant. Authoritative when present, immune to clock
    /// skew between receipt and storage.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    pub user: UserProfile,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AuthResponse {
    /// Convert into an [`AuthBundle`], resolving the expiry instant.
    ///
    /// `expiresAt` wins when the server sends it; otherwise the expiry is
    /// computed from `expiresIn` relative to now. A payload carrying neither
    /// is rejected rather than stored with a guessed lifetime.
    pub fn into_bundle(self) -> Result<AuthBundle, AuthError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => Utc::now() + Duration::seconds(secs),
            (None, None) => {
                return Err(AuthError::Other(
                    "session payload carries neither expiresAt nor expiresIn".to_string(),
                ));
            }
        };
        Ok(AuthBundle {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at,
            user: self.user,
        })
    }
}

// ---------------------------------------------------------------------------
// API trait
// ---------------------------------------------------------------------------

/// Backend operations behind the session lifecycle.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a session payload.
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthBundle, AuthError>;

    /// Create an account. Returns the created profile without establishing
    /// a session.
    async fn register(&self, details: &RegisterRequest) -> Result<UserProfile, AuthError>;

    /// Exchange the current token pair for a fresh one.
    ///
    /// A 401 here means the refresh token itself is no longer accepted and
    /// surfaces as [`AuthError::Api`] with that status.
    async fn refresh(&self, tokens: &RefreshRequest) -> Result<AuthBundle, AuthError>;
}

#[async_trait]
impl<T: AuthApi + ?Sized> AuthApi for std::sync::Arc<T> {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthBundle, AuthError> {
        (**self).login(credentials).await
    }

    async fn register(&self, details: &RegisterRequest) -> Result<UserProfile, AuthError> {
        (**self).register(details).await
    }

    async fn refresh(&self, tokens: &RefreshRequest) -> Result<AuthBundle, AuthError> {
        (**self).refresh(tokens).await
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`AuthApi`] over HTTP.
///
/// The client handed in here should carry no recovery interceptor: the auth
/// endpoints are public, and a 401 from them means bad credentials, not a
/// stale session.
pub struct HttpAuthApi {
    client: ApiClient,
    endpoints: EndpointsConfig,
}

impl HttpAuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self::with_endpoints(client, EndpointsConfig::default())
    }

    pub fn with_endpoints(client: ApiClient, endpoints: EndpointsConfig) -> Self {
        Self { client, endpoints }
    }

    async fn post_session(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<AuthBundle, AuthError> {
        let response = self.client.post_json(path, body).await?;
        let status = response.status();

        if !status.is_success() {
            let err = api_error(response).await;
            warn!(path, status = status.as_u16(), error = %err, "Auth request rejected");
            return Err(err);
        }

        let body = response.text().await?;
        let payload: AuthResponse = serde_json::from_str(&body)?;
        payload.into_bundle()
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthBundle, AuthError> {
        debug!(username = %credentials.username, "Logging in");
        self.post_session(&self.endpoints.login, credentials).await
    }

    async fn register(&self, details: &RegisterRequest) -> Result<UserProfile, AuthError> {
        debug!(username = %details.username, "Registering account");
        let response = self
            .client
            .post_json(&self.endpoints.register, details)
            .await?;
        let status = response.status();

        if !status.is_success() {
            let err = api_error(response).await;
            warn!(status = status.as_u16(), error = %err, "Registration rejected");
            return Err(err);
        }

        let body = response.text().await?;
        let profile: UserProfile = serde_json::from_str(&body)?;
        Ok(profile)
    }

    async fn refresh(&self, tokens: &RefreshRequest) -> Result<AuthBundle, AuthError> {
        debug!("Refreshing session tokens");
        self.post_session(&self.endpoints.refresh, tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_request_serializes_camel_case() {
        let request = RefreshRequest {
            access_token: "old-access".into(),
            refresh_token: "old-refresh".into(),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["accessToken"], "old-access");
        assert_eq!(json["refreshToken"], "old-refresh");
    }

    #[test]
    fn auth_response_parses_full_payload() {
        let payload: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "access",
                "refreshToken": "refresh",
                "tokenType": "Bearer",
                "expiresIn": 3600,
                "expiresAt": "2026-08-25T12:00:00Z",
                "user": {"username": "alice", "roles": ["USER"]}
            }"#,
        )
        .unwrap();

        assert_eq!(payload.access_token, "access");
        assert_eq!(payload.expires_in, Some(3600));
        assert_eq!(payload.user.username, "alice");
    }

    #[test]
    fn absolute_expiry_wins_over_lifetime() {
        let payload: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "a",
                "refreshToken": "r",
                "expiresIn": 5,
                "expiresAt": "2030-01-01T00:00:00Z",
                "user": {"username": "alice"}
            }"#,
        )
        .unwrap();
        let bundle = payload.into_bundle().unwrap();

        assert_eq!(
            bundle.expires_at,
            "2030-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn lifetime_is_resolved_relative_to_now() {
        let payload: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "a",
                "refreshToken": "r",
                "expiresIn": 3600,
                "user": {"username": "alice"}
            }"#,
        )
        .unwrap();
        let bundle = payload.into_bundle().unwrap();

        let expected = Utc::now() + Duration::seconds(3600);
        let drift = (bundle.expires_at - expected).num_seconds().abs();
        assert!(drift <= 5, "expiry drifted {drift}s from expected");
    }

    #[test]
    fn payload_without_expiry_is_rejected() {
        let payload: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "a",
                "refreshToken": "r",
                "user": {"username": "alice"}
            }"#,
        )
        .unwrap();

        assert!(payload.into_bundle().is_err());
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let payload: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "a",
                "refreshToken": "r",
                "expiresIn": 60,
                "user": {"username": "alice"}
            }"#,
        )
        .unwrap();

        assert_eq!(payload.token_type, "Bearer");
    }
}

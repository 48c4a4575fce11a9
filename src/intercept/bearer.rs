//! Bearer token attachment.

use std::sync::Arc;

use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::warn;

use super::RequestInterceptor;
use crate::error::AuthError;
use crate::session::SessionAccess;

/// Attaches `Authorization: Bearer <token>` to outgoing requests.
///
/// Requests go out untouched when no token is stored, so public endpoints
/// work before login. On a retry the interceptor runs again and replaces the
/// header, which means a token refreshed between sends is picked up.
pub struct BearerInterceptor {
    session: Arc<dyn SessionAccess>,
}

impl BearerInterceptor {
    pub fn new(session: Arc<dyn SessionAccess>) -> Self {
        Self { session }
    }
}

impl RequestInterceptor for BearerInterceptor {
    fn before_send(&self, request: &mut Request) -> Result<(), AuthError> {
        let Some(token) = self.session.access_token() else {
            return Ok(());
        };
        if token.is_empty() {
            return Ok(());
        }
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => {
                warn!("Stored access token is not a valid header value, sending without it");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "bearer"
    }
}

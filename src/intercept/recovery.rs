//! Session recovery for rejected requests.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use super::{Recovery, RequestInfo, ResponseRecovery};
use crate::config::EndpointsConfig;
use crate::session::SessionAccess;

/// Paths that are reachable without a session.
///
/// Auth endpoints themselves and translation assets must never trigger a
/// refresh loop: a 401 from `/login` means bad credentials, not a stale
/// token. Suffixes match the end of the request path, prefixes match its
/// start.
#[derive(Debug, Clone)]
pub struct PublicEndpoints {
    suffixes: Vec<String>,
    prefixes: Vec<String>,
}

impl PublicEndpoints {
    pub fn new(suffixes: Vec<String>, prefixes: Vec<String>) -> Self {
        Self { suffixes, prefixes }
    }

    pub fn from_config(endpoints: &EndpointsConfig) -> Self {
        Self::new(
            endpoints.public_suffixes.clone(),
            endpoints.public_prefixes.clone(),
        )
    }

    /// Whether the given request path is reachable without a session.
    pub fn is_public(&self, path: &str) -> bool {
        self.suffixes.iter().any(|s| path.ends_with(s.as_str()))
            || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

impl Default for PublicEndpoints {
    fn default() -> Self {
        Self::from_config(&EndpointsConfig::default())
    }
}

/// Recovers sessions rejected with 401 or 403.
///
/// For a protected endpoint the interceptor asks the session manager for a
/// valid token (refreshing it when possible) and retries the request once.
/// When the session cannot be recovered it is torn down and the original
/// rejection surfaces to the caller.
pub struct AuthRecoveryInterceptor {
    session: Arc<dyn SessionAccess>,
    public: PublicEndpoints,
}

impl AuthRecoveryInterceptor {
    pub fn new(session: Arc<dyn SessionAccess>, public: PublicEndpoints) -> Self {
        Self { session, public }
    }
}

#[async_trait]
impl ResponseRecovery for AuthRecoveryInterceptor {
    async fn recover(&self, request: &RequestInfo, response: &Response) -> Recovery {
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return Recovery::Proceed;
        }

        let path = request.path();
        if self.public.is_public(path) {
            debug!(
                path,
                status = status.as_u16(),
                "Auth failure on public endpoint, passing through"
            );
            return Recovery::Proceed;
        }

        match self.session.ensure_valid_token().await {
            Ok(true) => {
                debug!(path, "Session recovered, retrying request");
                Recovery::Retry
            }
            Ok(false) => {
                warn!(
                    path,
                    status = status.as_u16(),
                    "Session could not be recovered, logging out"
                );
                self.session.logout_silent().await;
                Recovery::Fail
            }
            Err(e) => {
                warn!(path, error = %e, "Session recovery failed, logging out");
                self.session.logout_silent().await;
                Recovery::Fail
            }
        }
    }

    fn name(&self) -> &str {
        "auth-recovery"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::{Method, Request, Url};

    use super::*;
    use crate::error::AuthError;
    use crate::session::token::UserProfile;

    enum EnsureOutcome {
        Recovered,
        NotRecovered,
        Errors,
    }

    struct StubSession {
        outcome: EnsureOutcome,
        ensure_calls: AtomicUsize,
        logouts: AtomicUsize,
    }

    impl StubSession {
        fn new(outcome: EnsureOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                ensure_calls: AtomicUsize::new(0),
                logouts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionAccess for StubSession {
        fn is_logged_in(&self) -> bool {
            true
        }

        fn access_token(&self) -> Option<String> {
            Some("token".into())
        }

        fn user(&self) -> Option<UserProfile> {
            None
        }

        async fn ensure_valid_token(&self) -> Result<bool, AuthError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                EnsureOutcome::Recovered => Ok(true),
                EnsureOutcome::NotRecovered => Ok(false),
                EnsureOutcome::Errors => Err(AuthError::NotAuthenticated),
            }
        }

        async fn logout_silent(&self) {
            self.logouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn info(path: &str) -> RequestInfo {
        let url = Url::parse(&format!("http://127.0.0.1:8080{path}")).unwrap();
        RequestInfo::of(&Request::new(Method::GET, url))
    }

    fn response(status: u16) -> Response {
        let inner = http::Response::builder().status(status).body("").unwrap();
        Response::from(inner)
    }

    #[test]
    fn default_allowlist_matches_auth_endpoints_and_assets() {
        let public = PublicEndpoints::default();

        assert!(public.is_public("/api/login"));
        assert!(public.is_public("/api/register"));
        assert!(public.is_public("/api/refresh-token"));
        assert!(public.is_public("/assets/i18n/is.json"));
        assert!(!public.is_public("/api/profile"));
        assert!(!public.is_public("/api/login/history"));
    }

    #[tokio::test]
    async fn non_auth_status_passes_through() {
        let session = StubSession::new(EnsureOutcome::Recovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/profile"), &response(404))
            .await;

        assert_eq!(decision, Recovery::Proceed);
        assert_eq!(session.ensure_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unauthorized_recovers_and_retries() {
        let session = StubSession::new(EnsureOutcome::Recovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/profile"), &response(401))
            .await;

        assert_eq!(decision, Recovery::Retry);
        assert_eq!(session.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forbidden_is_treated_like_unauthorized() {
        let session = StubSession::new(EnsureOutcome::Recovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/profile"), &response(403))
            .await;

        assert_eq!(decision, Recovery::Retry);
    }

    #[tokio::test]
    async fn unrecoverable_session_logs_out_and_fails() {
        let session = StubSession::new(EnsureOutcome::NotRecovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/profile"), &response(401))
            .await;

        assert_eq!(decision, Recovery::Fail);
        assert_eq!(session.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovery_error_logs_out_and_fails() {
        let session = StubSession::new(EnsureOutcome::Errors);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/profile"), &response(401))
            .await;

        assert_eq!(decision, Recovery::Fail);
        assert_eq!(session.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_login_is_not_recovered() {
        let session = StubSession::new(EnsureOutcome::Recovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/api/login"), &response(401))
            .await;

        assert_eq!(decision, Recovery::Proceed);
        assert_eq!(session.ensure_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn translation_assets_are_not_recovered() {
        let session = StubSession::new(EnsureOutcome::Recovered);
        let interceptor =
            AuthRecoveryInterceptor::new(session.clone(), PublicEndpoints::default());

        let decision = interceptor
            .recover(&info("/assets/i18n/en.json"), &response(401))
            .await;

        assert_eq!(decision, Recovery::Proceed);
        assert_eq!(session.ensure_calls.load(Ordering::SeqCst), 0);
    }
}

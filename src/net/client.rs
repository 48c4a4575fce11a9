//! Authenticated HTTP client.
//!
//! [`ApiClient`] wraps a shared [`reqwest::Client`] with the application
//! defaults (User-Agent, timeouts) and runs every request through the
//! interceptor chains from [`crate::intercept`]. Request interceptors run in
//! registration order before each send; recovery interceptors run in order
//! when a response comes back non-success, and may trigger a single retry of
//! the original request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Request, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::AuthError;
use crate::intercept::{Recovery, RequestInfo, RequestInterceptor, ResponseRecovery};

/// Default user agent for the application.
pub const USER_AGENT: &str = "hasp/0.1.0";

/// Default connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with an ordered interceptor chain.
///
/// Cloning is cheap: clones share the connection pool and the registered
/// interceptors.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    interceptors: Arc<Vec<Arc<dyn RequestInterceptor>>>,
    recovery: Arc<Vec<Arc<dyn ResponseRecovery>>>,
}

impl ApiClient {
    /// Create a new builder rooted at the given API base URL.
    pub fn builder(base_url: &str) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// Create a builder seeded from configuration.
    pub fn from_config(config: &ApiConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(&config.base_url)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.http
    }

    /// The API base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL.
    pub fn join(&self, path: &str) -> Result<Url, AuthError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| AuthError::Other(format!("invalid request path {path:?}: {e}")))
    }

    /// Send a GET request through the interceptor chain.
    pub async fn get(&self, path: &str) -> Result<Response, AuthError> {
        let url = self.join(path)?;
        let request = self.http.get(url).build()?;
        self.execute(request).await
    }

    /// Send a POST request with a JSON body through the interceptor chain.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, AuthError> {
        let url = self.join(path)?;
        let request = self.http.post(url).json(body).build()?;
        self.execute(request).await
    }

    /// Run a request through both interceptor chains.
    ///
    /// Transport failures surface as [`AuthError::Http`] without consulting
    /// the recovery chain. A [`Recovery::Retry`] decision re-sends the
    /// original request once, re-running the request interceptors so a token
    /// refreshed in between is attached; the retried response is final. A
    /// request whose body cannot be cloned is never retried, the original
    /// response is handed through instead.
    pub async fn execute(&self, mut request: Request) -> Result<Response, AuthError> {
        let request_id = Uuid::new_v4();
        let info = RequestInfo::of(&request);

        for interceptor in self.interceptors.iter() {
            interceptor.before_send(&mut request)?;
        }
        let mut replay = request.try_clone();

        debug!(%request_id, method = %info.method(), url = %info.url(), "Sending request");
        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        debug!(%request_id, status = status.as_u16(), "Request rejected");

        for recovery in self.recovery.iter() {
            match recovery.recover(&info, &response).await {
                Recovery::Proceed => continue,
                Recovery::Retry => {
                    let Some(mut retry) = replay.take() else {
                        debug!(
                            %request_id,
                            interceptor = recovery.name(),
                            "Request body cannot be replayed, passing response through"
                        );
                        return Ok(response);
                    };
                    for interceptor in self.interceptors.iter() {
                        interceptor.before_send(&mut retry)?;
                    }
                    debug!(%request_id, interceptor = recovery.name(), "Retrying request once");
                    return self.http.execute(retry).await.map_err(AuthError::from);
                }
                Recovery::Fail => {
                    warn!(
                        %request_id,
                        interceptor = recovery.name(),
                        status = status.as_u16(),
                        "Request failed without recovery"
                    );
                    return Err(api_error(response).await);
                }
            }
        }
        Ok(response)
    }
}

/// Turn a non-success response into an [`AuthError::Api`].
///
/// The body is read best-effort: a JSON `message` field wins, otherwise the
/// raw body text, otherwise a generic message.
pub(crate) async fn api_error(response: Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: String,
    }

    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) if !parsed.message.is_empty() => parsed.message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => "request rejected".to_string(),
    };
    AuthError::Api { status, message }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    recovery: Vec<Arc<dyn ResponseRecovery>>,
}

impl ApiClientBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_agent: USER_AGENT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            interceptors: Vec::new(),
            recovery: Vec::new(),
        }
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = ua.to_string();
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Append a request interceptor. Interceptors run in insertion order.
    pub fn interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Append a response recovery interceptor. Runs in insertion order on
    /// non-success responses.
    pub fn recovery(mut self, recovery: Arc<dyn ResponseRecovery>) -> Self {
        self.recovery.push(recovery);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient, AuthError> {
        let base_url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| AuthError::Other(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        let http = match Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Failed to build HTTP client with custom config: {}; using defaults",
                    e
                );
                Client::default()
            }
        };
        Ok(ApiClient {
            http,
            base_url,
            interceptors: Arc::new(self.interceptors),
            recovery: Arc::new(self.recovery),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_invalid_base_url() {
        let result = ApiClient::builder("not a url").build();
        assert!(result.is_err());
    }

    #[test]
    fn join_resolves_paths_against_base() {
        let client = ApiClient::builder("http://127.0.0.1:8080/api")
            .build()
            .unwrap();

        assert_eq!(
            client.join("/login").unwrap().as_str(),
            "http://127.0.0.1:8080/api/login"
        );
        assert_eq!(
            client.join("refresh-token").unwrap().as_str(),
            "http://127.0.0.1:8080/api/refresh-token"
        );
    }

    #[test]
    fn trailing_base_slash_is_normalized() {
        let client = ApiClient::builder("http://127.0.0.1:8080/api/")
            .build()
            .unwrap();

        assert_eq!(
            client.join("/login").unwrap().as_str(),
            "http://127.0.0.1:8080/api/login"
        );
    }

    #[tokio::test]
    async fn api_error_prefers_json_message() {
        let inner = http::Response::builder()
            .status(401)
            .body(r#"{"message":"Invalid credentials"}"#)
            .unwrap();
        let err = api_error(reqwest::Response::from(inner)).await;

        match err {
            AuthError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_error_falls_back_to_body_text() {
        let inner = http::Response::builder()
            .status(500)
            .body("database unavailable")
            .unwrap();
        let err = api_error(reqwest::Response::from(inner)).await;

        match err {
            AuthError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

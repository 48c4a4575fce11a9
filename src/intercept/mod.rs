//! Request/response interceptor chain.
//!
//! Every request sent through [`crate::net::ApiClient`] passes two ordered
//! chains. [`RequestInterceptor`]s run before the request leaves the process
//! and may mutate it in place (attach headers, stamp correlation ids).
//! [`ResponseRecovery`] interceptors run only when the response comes back
//! with a non-success status and decide what happens next: hand the response
//! through, re-send the original request once, or abort the call.
//!
//! Ordering is explicit: interceptors run in the order they were registered
//! on the client, and a recovery decision other than [`Recovery::Proceed`]
//! short-circuits the rest of the recovery chain.

pub mod bearer;
pub mod recovery;

pub use bearer::BearerInterceptor;
pub use recovery::{AuthRecoveryInterceptor, PublicEndpoints};

use async_trait::async_trait;
use reqwest::{Method, Request, Response, Url};

use crate::error::AuthError;

/// Decision returned by a [`ResponseRecovery`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Hand the response back to the caller unchanged.
    Proceed,
    /// Re-send the original request once. The retried response is final.
    Retry,
    /// Abort the call; the caller sees the original status as an error.
    Fail,
}

/// Mutates outgoing requests before they are sent.
///
/// Runs on the first send and again on a [`Recovery::Retry`] re-send, so
/// header-attaching interceptors always see current session state.
pub trait RequestInterceptor: Send + Sync {
    fn before_send(&self, request: &mut Request) -> Result<(), AuthError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Inspects non-success responses and decides whether the request should be
/// handed through, retried, or failed.
#[async_trait]
pub trait ResponseRecovery: Send + Sync {
    async fn recover(&self, request: &RequestInfo, response: &Response) -> Recovery;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Immutable snapshot of the original request, captured before the first
/// send so recovery interceptors can inspect it after the body has moved.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    method: Method,
    url: Url,
}

impl RequestInfo {
    pub fn of(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            url: request.url().clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path component of the request URL, without query or fragment.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

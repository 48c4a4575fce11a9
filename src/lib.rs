//! Client-side session and token lifecycle: credential storage, proactive
//! refresh, route gates, and authenticated HTTP with recovery interceptors.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod intercept;
pub mod net;
pub mod session;
pub mod shell;
pub mod store;

use std::sync::Arc;

use crate::api::HttpAuthApi;
use crate::config::Config;
use crate::error::AuthError;
use crate::gate::{AuthGate, EntryGate, GuestGate, RoleGate};
use crate::intercept::{AuthRecoveryInterceptor, BearerInterceptor, PublicEndpoints};
use crate::net::ApiClient;
use crate::session::{SessionAccess, SessionManager};
use crate::shell::{Localizer, Navigator, Notifier};
use crate::store::CredentialStore;

/// Fully wired session stack shared across the application.
///
/// Two HTTP clients exist underneath. The auth endpoints are called through
/// a plain client: they are public, authenticate through their payloads, and
/// must never recurse into recovery. The [`client`](Self::client) exposed
/// here is the one for application requests and carries bearer attachment
/// plus 401/403 recovery backed by the session manager.
#[derive(Clone)]
pub struct AuthStack {
    pub config: Arc<Config>,
    pub store: Arc<dyn CredentialStore>,
    pub session: SessionManager,
    pub client: ApiClient,
}

impl AuthStack {
    /// Wire the stack from configuration, selecting the credential store
    /// backend the configuration names.
    pub fn new(
        config: Config,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        localizer: Arc<dyn Localizer>,
    ) -> Result<Self, AuthError> {
        let store = store::from_config(&config.storage)?;
        Self::with_store(config, store, navigator, notifier, localizer)
    }

    /// Wire the stack around an existing credential store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        localizer: Arc<dyn Localizer>,
    ) -> Result<Self, AuthError> {
        let config = Arc::new(config);

        let auth_client = ApiClient::from_config(&config.api).build()?;
        let auth_api = Arc::new(HttpAuthApi::with_endpoints(
            auth_client,
            config.endpoints.clone(),
        ));
        let session = SessionManager::new(
            &config,
            store.clone(),
            auth_api,
            navigator,
            notifier,
            localizer,
        );

        let session_access: Arc<dyn SessionAccess> = Arc::new(session.clone());
        let public = PublicEndpoints::from_config(&config.endpoints);
        let client = ApiClient::from_config(&config.api)
            .interceptor(Arc::new(BearerInterceptor::new(session_access.clone())))
            .recovery(Arc::new(AuthRecoveryInterceptor::new(
                session_access,
                public,
            )))
            .build()?;

        Ok(Self {
            config,
            store,
            session,
            client,
        })
    }

    /// Startup sequence: restore session state, then refresh or arm the
    /// expiry watchdog for a restored token.
    pub async fn initialize(&self) {
        self.session.initialize().await;
        self.session.schedule_expiry_check().await;
    }

    /// The session surface gates and interceptors consume.
    pub fn session_access(&self) -> Arc<dyn SessionAccess> {
        Arc::new(self.session.clone())
    }

    /// Gate for routes that require a live session.
    pub fn auth_gate(&self) -> AuthGate {
        AuthGate::new(self.session_access(), self.config.routes.clone())
    }

    /// Gate for guest-only routes such as login and registration.
    pub fn guest_gate(&self) -> GuestGate {
        GuestGate::new(self.session_access(), self.config.routes.clone())
    }

    /// Dispatch gate for the bare root route.
    pub fn entry_gate(&self) -> EntryGate {
        EntryGate::new(self.session_access(), self.config.routes.clone())
    }

    /// Gate for management routes, restricted to admins and managers.
    pub fn admin_gate(&self) -> RoleGate {
        RoleGate::admin_or_manager(self.session_access(), self.config.routes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Decision, RouteContext, SessionGate};
    use crate::shell::{MemoryNavigator, MemoryNotifier, StaticLocalizer};
    use crate::store::MemoryCredentialStore;

    fn stack() -> AuthStack {
        AuthStack::with_store(
            Config::default(),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryNavigator::new()),
            Arc::new(MemoryNotifier::new()),
            Arc::new(StaticLocalizer::english()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn wires_up_with_defaults() {
        let stack = stack();

        stack.initialize().await;

        assert!(!stack.session.is_logged_in());
        assert_eq!(stack.store.name(), "memory");
    }

    #[tokio::test]
    async fn gates_share_the_session_state() {
        let stack = stack();
        stack.initialize().await;

        let decision = stack.auth_gate().can_enter(&RouteContext::new("/home")).await;
        assert_eq!(decision, Decision::Redirect("/auth/login".into()));

        let decision = stack
            .guest_gate()
            .can_enter(&RouteContext::new("/auth/login"))
            .await;
        assert_eq!(decision, Decision::Allow);
    }
}

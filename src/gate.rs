//! Route admission gates.
//!
//! A [`SessionGate`] decides whether navigation into a route may proceed,
//! returning either [`Decision::Allow`] or a redirect target. All gates are
//! fail-closed: an error from the underlying session check collapses into a
//! redirect, never an allow, so a broken store or backend can't open a
//! protected route.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RoutesConfig;
use crate::session::SessionAccess;
use crate::session::token::role;

/// Route the user is trying to enter.
#[derive(Debug, Clone)]
pub struct RouteContext {
    path: String,
}

impl RouteContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Enter the requested route.
    Allow,
    /// Navigate to the given path instead.
    Redirect(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Admission check run before a route is entered.
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn can_enter(&self, route: &RouteContext) -> Decision;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

/// Protects routes that require a live session.
///
/// Beyond the logged-in flag, entry demands a token that is valid right now:
/// the gate runs the ensure-valid-token path, which refreshes a near-expiry
/// token before the route loads.
pub struct AuthGate {
    session: Arc<dyn SessionAccess>,
    routes: RoutesConfig,
}

impl AuthGate {
    pub fn new(session: Arc<dyn SessionAccess>, routes: RoutesConfig) -> Self {
        Self { session, routes }
    }
}

#[async_trait]
impl SessionGate for AuthGate {
    async fn can_enter(&self, route: &RouteContext) -> Decision {
        if !self.session.is_logged_in() {
            debug!(path = route.path(), "Not logged in, redirecting to login");
            return Decision::Redirect(self.routes.login.clone());
        }
        match self.session.ensure_valid_token().await {
            Ok(true) => Decision::Allow,
            Ok(false) => {
                debug!(path = route.path(), "Session not usable, redirecting to login");
                Decision::Redirect(self.routes.login.clone())
            }
            Err(e) => {
                warn!(path = route.path(), error = %e, "Session check failed, denying entry");
                Decision::Redirect(self.routes.login.clone())
            }
        }
    }

    fn name(&self) -> &str {
        "auth"
    }
}

// ---------------------------------------------------------------------------
// GuestGate
// ---------------------------------------------------------------------------

/// Protects guest-only routes (login, registration) from users who already
/// have a session. The logged-in flag alone decides; visiting the login
/// page never triggers a token refresh.
pub struct GuestGate {
    session: Arc<dyn SessionAccess>,
    routes: RoutesConfig,
}

impl GuestGate {
    pub fn new(session: Arc<dyn SessionAccess>, routes: RoutesConfig) -> Self {
        Self { session, routes }
    }
}

#[async_trait]
impl SessionGate for GuestGate {
    async fn can_enter(&self, route: &RouteContext) -> Decision {
        if self.session.is_logged_in() {
            debug!(path = route.path(), "Already logged in, redirecting home");
            Decision::Redirect(self.routes.home.clone())
        } else {
            Decision::Allow
        }
    }

    fn name(&self) -> &str {
        "guest"
    }
}

// ---------------------------------------------------------------------------
// EntryGate
// ---------------------------------------------------------------------------

/// Dispatches the bare root route: logged-in users go home, everyone else to
/// login. Never allows the root itself to render.
pub struct EntryGate {
    session: Arc<dyn SessionAccess>,
    routes: RoutesConfig,
}

impl EntryGate {
    pub fn new(session: Arc<dyn SessionAccess>, routes: RoutesConfig) -> Self {
        Self { session, routes }
    }
}

#[async_trait]
impl SessionGate for EntryGate {
    async fn can_enter(&self, _route: &RouteContext) -> Decision {
        if self.session.is_logged_in() {
            Decision::Redirect(self.routes.home.clone())
        } else {
            Decision::Redirect(self.routes.login.clone())
        }
    }

    fn name(&self) -> &str {
        "entry"
    }
}

// ---------------------------------------------------------------------------
// RoleGate
// ---------------------------------------------------------------------------

/// Protects routes that require one of a set of roles.
///
/// Session problems redirect to login like [`AuthGate`]; a live session
/// without a qualifying role is sent to the root instead, where the entry
/// dispatch takes over.
pub struct RoleGate {
    session: Arc<dyn SessionAccess>,
    routes: RoutesConfig,
    allowed: HashSet<String>,
}

impl RoleGate {
    pub fn new(
        session: Arc<dyn SessionAccess>,
        routes: RoutesConfig,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            session,
            routes,
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Gate for management screens: admins and managers only.
    pub fn admin_or_manager(session: Arc<dyn SessionAccess>, routes: RoutesConfig) -> Self {
        Self::new(session, routes, [role::ADMIN, role::MANAGER])
    }
}

#[async_trait]
impl SessionGate for RoleGate {
    async fn can_enter(&self, route: &RouteContext) -> Decision {
        if !self.session.is_logged_in() {
            debug!(path = route.path(), "Not logged in, redirecting to login");
            return Decision::Redirect(self.routes.login.clone());
        }
        match self.session.ensure_valid_token().await {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = route.path(), "Session not usable, redirecting to login");
                return Decision::Redirect(self.routes.login.clone());
            }
            Err(e) => {
                warn!(path = route.path(), error = %e, "Session check failed, denying entry");
                return Decision::Redirect(self.routes.login.clone());
            }
        }

        let Some(user) = self.session.user() else {
            debug!(path = route.path(), "No profile available, redirecting to root");
            return Decision::Redirect(self.routes.root.clone());
        };
        if user.roles.is_empty() || !user.has_any_role(&self.allowed) {
            debug!(
                path = route.path(),
                username = %user.username,
                "Role requirement not met, redirecting to root"
            );
            return Decision::Redirect(self.routes.root.clone());
        }
        Decision::Allow
    }

    fn name(&self) -> &str {
        "role"
    }
}

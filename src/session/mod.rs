//! Session lifecycle management.
//!
//! [`SessionManager`] owns the login state of the application: it installs
//! credentials after login, answers token/profile reads, keeps the access
//! token fresh ahead of its expiry, and tears the session down when the
//! backend stops accepting it.
//!
//! The manager is a cheap-to-clone handle around shared state. Stored
//! credentials live in the [`CredentialStore`]; every token, expiry, and
//! profile read goes straight to the store so external changes are always
//! visible. Only the logged-in flag is held in memory.
//!
//! Refreshes are single-flight: any number of concurrent
//! [`ensure_valid_token`](SessionManager::ensure_valid_token) callers produce
//! at most one backend call, with late callers waiting on a shared
//! notification and adopting the leader's outcome. A proactive timer runs the
//! same path shortly before the token expires.

pub mod token;

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{AuthApi, LoginRequest, RefreshRequest};
use crate::config::{Config, RoutesConfig, SessionConfig};
use crate::error::AuthError;
use crate::shell::{Localizer, Navigator, Notifier, msg};
use crate::store::{CredentialKey, CredentialRecord, CredentialStore};
use token::{AuthBundle, UserProfile, within_refresh_window};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the proactive refresh machinery currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No timer armed, no refresh running.
    Idle,
    /// A refresh will be attempted at the given instant.
    Scheduled { at: DateTime<Utc> },
    /// A refresh call is in flight.
    Refreshing,
}

/// Point-in-time view of the session, for diagnostics and UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub phase: RefreshPhase,
}

/// Lifecycle notifications emitted by the manager.
///
/// Delivery is best-effort over a broadcast channel; emitting with no
/// subscribers is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    TokenRefreshed { expires_at: DateTime<Utc> },
    SessionExpired,
    LoggedOut,
}

/// Narrow session surface consumed by route gates and the HTTP recovery
/// interceptor.
///
/// [`SessionManager`] is the production implementation and never returns
/// `Err` from `ensure_valid_token`; the `Result` exists so a failing
/// implementation is handled fail-closed by callers.
#[async_trait]
pub trait SessionAccess: Send + Sync {
    /// Whether a session is currently installed.
    fn is_logged_in(&self) -> bool;

    /// Current access token, if one is stored.
    fn access_token(&self) -> Option<String>;

    /// Current user profile, if one is stored and parseable.
    fn user(&self) -> Option<UserProfile>;

    /// Make sure the stored access token is usable right now, refreshing it
    /// when it is about to expire. `Ok(true)` means requests may proceed.
    async fn ensure_valid_token(&self) -> Result<bool, AuthError>;

    /// Tear the session down and return to the login route, without any
    /// user-visible notification.
    async fn logout_silent(&self);
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

const EVENT_CHANNEL_CAPACITY: usize = 16;

struct Inner {
    store: Arc<dyn CredentialStore>,
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    localizer: Arc<dyn Localizer>,
    session: SessionConfig,
    routes: RoutesConfig,

    logged_in: AtomicBool,
    // Single-flight gate: Some while a refresh round is in flight. The
    // leader installs the Notify, followers wait on it. Held only for
    // short sync sections, never across an await.
    refresh_gate: StdMutex<Option<Arc<Notify>>>,
    // Outcome of the most recently completed refresh round; written by the
    // leader before the gate is released.
    last_outcome: StdMutex<Option<bool>>,
    phase: StdMutex<RefreshPhase>,
    timer: StdMutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
        }
    }
}

/// Open refresh round held by the leader.
///
/// Publishing the outcome and releasing the gate happen in `Drop`, so a
/// leader future that is dropped mid-refresh still reopens the gate and
/// wakes its followers instead of stranding them.
struct RefreshRound<'a> {
    manager: &'a SessionManager,
    notify: Arc<Notify>,
    outcome: bool,
}

impl Drop for RefreshRound<'_> {
    fn drop(&mut self) {
        let inner = &self.manager.inner;
        // Publish before releasing the gate so woken followers always find
        // an outcome.
        if let Ok(mut last) = inner.last_outcome.lock() {
            *last = Some(self.outcome);
        }
        if let Ok(mut gate) = inner.refresh_gate.lock() {
            *gate = None;
        }
        self.notify.notify_waiters();
    }
}

/// Handle to the shared session state. Clones share everything.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("logged_in", &self.is_logged_in())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        localizer: Arc<dyn Localizer>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                navigator,
                notifier,
                localizer,
                session: config.session.clone(),
                routes: config.routes.clone(),
                logged_in: AtomicBool::new(false),
                refresh_gate: StdMutex::new(None),
                last_outcome: StdMutex::new(None),
                phase: StdMutex::new(RefreshPhase::Idle),
                timer: StdMutex::new(None),
                events,
            }),
        }
    }

    /// Restore session state at startup.
    ///
    /// Waits (bounded) for the localizer so early toasts come out translated,
    /// then marks the session live when the store still holds a token and a
    /// profile. Does not arm any timer; call
    /// [`schedule_expiry_check`](Self::schedule_expiry_check) for that.
    pub async fn initialize(&self) {
        let timeout = self.inner.session.locale_ready_timeout();
        if tokio::time::timeout(timeout, self.inner.localizer.ready())
            .await
            .is_err()
        {
            debug!(?timeout, "Localizer not ready in time, using fallback messages");
        }

        let restored = self.has_stored_session();
        self.inner.logged_in.store(restored, Ordering::SeqCst);
        info!(logged_in = restored, "Session manager initialized");
    }

    /// Whether a session is currently installed.
    pub fn is_logged_in(&self) -> bool {
        self.inner.logged_in.load(Ordering::SeqCst)
    }

    /// Stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.read_key(CredentialKey::AccessToken)
    }

    /// Stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.read_key(CredentialKey::RefreshToken)
    }

    /// Stored expiry instant. Unparseable values count as absent.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.read_key(CredentialKey::ExpiresAt)?;
        match raw.parse::<DateTime<Utc>>() {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(error = %e, "Stored expiry is not a valid timestamp, treating as absent");
                None
            }
        }
    }

    /// Stored user profile. Unparseable values count as absent.
    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.read_key(CredentialKey::UserData)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored profile is not valid JSON, treating as absent");
                None
            }
        }
    }

    /// Log in against the backend and install the returned session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<UserProfile, AuthError> {
        let bundle = self.inner.api.login(credentials).await?;
        let user = bundle.user.clone();
        self.set_auth_data(&bundle)?;
        info!(username = %user.username, "Login succeeded");
        Ok(user)
    }

    /// Install a credential bundle: persist it, mark the session live, and
    /// arm the proactive refresh timer from its expiry.
    pub fn set_auth_data(&self, bundle: &AuthBundle) -> Result<(), AuthError> {
        let record = CredentialRecord::from_bundle(bundle)?;
        self.inner.store.put_all(&record)?;

        let was_logged_in = self.inner.logged_in.swap(true, Ordering::SeqCst);
        self.arm_refresh_timer(bundle.expires_at);

        if was_logged_in {
            self.emit(SessionEvent::TokenRefreshed {
                expires_at: bundle.expires_at,
            });
        } else {
            self.emit(SessionEvent::LoggedIn {
                username: bundle.user.username.clone(),
            });
        }
        debug!(expires_at = %bundle.expires_at, "Session credentials installed");
        Ok(())
    }

    /// Drop all stored credentials and stop the refresh machinery.
    /// Idempotent; storage failures are logged, not surfaced.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Credential clear failed");
        }
        self.inner.logged_in.store(false, Ordering::SeqCst);
        self.cancel_refresh_timer();
    }

    /// User-initiated logout: clear, confirm with a toast, return to login.
    pub fn logout(&self) {
        self.clear();
        let message = self.inner.localizer.resolve(&msg::LOGOUT_SUCCESS);
        self.inner.notifier.success(&message);
        self.inner.navigator.navigate(&self.inner.routes.login);
        self.emit(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    /// Logout for automated failure paths: clear and return to login with no
    /// toast, so recovery cascades don't stack notifications.
    pub fn logout_silent(&self) {
        self.clear();
        self.inner.navigator.navigate(&self.inner.routes.login);
        self.emit(SessionEvent::LoggedOut);
        debug!("Logged out silently");
    }

    /// Make sure the stored access token is usable right now.
    ///
    /// Outside the refresh window this is a cheap read. Inside it, exactly
    /// one caller performs the backend refresh while the rest wait on a
    /// shared notification and adopt its outcome. `true` means requests may
    /// proceed with the (possibly rotated) stored token.
    pub async fn ensure_valid_token(&self) -> bool {
        let Some(expires_at) = self.expires_at() else {
            debug!("No usable expiry stored, ending session");
            self.logout_silent();
            return false;
        };
        let buffer = self.inner.session.refresh_buffer();
        if !within_refresh_window(expires_at, buffer) {
            return true;
        }

        // Join the in-flight round or open a new one. A follower must
        // create its Notified future while still holding the gate lock:
        // notify_waiters only wakes futures that already exist.
        let notify: Arc<Notify>;
        let follower_wait;
        {
            let mut gate = self.inner.refresh_gate.lock().expect("lock poisoned");
            match gate.as_ref() {
                Some(existing) => {
                    notify = Arc::clone(existing);
                    follower_wait = Some(notify.notified());
                }
                None => {
                    notify = Arc::new(Notify::new());
                    *gate = Some(Arc::clone(&notify));
                    follower_wait = None;
                }
            }
        }

        if let Some(wait) = follower_wait {
            debug!("Refresh already in flight, waiting for its outcome");
            wait.await;
            let outcome = self
                .inner
                .last_outcome
                .lock()
                .expect("lock poisoned")
                .unwrap_or(false);
            debug!(outcome, "Adopted refresh outcome");
            return outcome;
        }

        // Leader. The round guard releases the gate on every exit path.
        let mut round = RefreshRound {
            manager: self,
            notify: Arc::clone(&notify),
            outcome: false,
        };

        // Re-check the window first: the round that just released the gate
        // may already have rotated the token.
        round.outcome = match self.expires_at() {
            Some(current) if !within_refresh_window(current, buffer) => {
                debug!("Token already refreshed by a previous round");
                true
            }
            Some(_) => {
                self.set_phase(RefreshPhase::Refreshing);
                let refreshed = self.attempt_token_refresh().await;
                if !refreshed {
                    self.set_phase(RefreshPhase::Idle);
                }
                refreshed
            }
            None => {
                debug!("Session ended while acquiring the refresh gate");
                false
            }
        };
        round.outcome
    }

    /// Startup expiry check: refresh immediately when the stored token is
    /// already near expiry, otherwise arm the timer for it. Does nothing
    /// when logged out or without a usable expiry.
    pub async fn schedule_expiry_check(&self) {
        if !self.is_logged_in() {
            debug!("No session to watch for expiry");
            return;
        }
        let Some(expires_at) = self.expires_at() else {
            debug!("Session has no usable expiry to watch");
            return;
        };

        if within_refresh_window(expires_at, self.inner.session.refresh_buffer()) {
            debug!("Stored token already near expiry, refreshing now");
            let _ = self.ensure_valid_token().await;
        } else {
            self.arm_refresh_timer(expires_at);
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the current session state.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            logged_in: self.is_logged_in(),
            expires_at: self.expires_at(),
            phase: self.phase(),
        }
    }

    // -- internals ----------------------------------------------------------

    fn read_key(&self, key: CredentialKey) -> Option<String> {
        match self.inner.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(%key, error = %e, "Credential read failed");
                None
            }
        }
    }

    fn has_stored_session(&self) -> bool {
        let token = self.read_key(CredentialKey::AccessToken);
        let user = self.read_key(CredentialKey::UserData);
        token.is_some_and(|t| !t.is_empty()) && user.is_some()
    }

    /// One backend refresh attempt. Returns whether the session is usable
    /// afterwards; all side effects (store, toasts, navigation) happen here.
    async fn attempt_token_refresh(&self) -> bool {
        let (Some(access_token), Some(refresh_token)) =
            (self.access_token(), self.refresh_token())
        else {
            warn!("Refresh impossible without a stored token pair, ending session");
            self.logout_silent();
            return false;
        };

        let request = RefreshRequest {
            access_token,
            refresh_token,
        };
        match self.inner.api.refresh(&request).await {
            Ok(bundle) => {
                if let Err(e) = self.set_auth_data(&bundle) {
                    warn!(error = %e, "Refreshed credentials could not be stored");
                    let message = self.inner.localizer.resolve(&msg::REFRESH_FAILED);
                    self.inner.notifier.error(&message);
                    return false;
                }
                info!(expires_at = %bundle.expires_at, "Session tokens refreshed");
                true
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Refresh token rejected, ending session");
                let message = self.inner.localizer.resolve(&msg::SESSION_EXPIRED);
                self.inner.notifier.warning(&message);
                self.emit(SessionEvent::SessionExpired);
                self.logout_silent();
                false
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping current session");
                let message = self.inner.localizer.resolve(&msg::REFRESH_FAILED);
                self.inner.notifier.error(&message);
                false
            }
        }
    }

    /// Arm (or re-arm) the proactive refresh timer for `expires_at - buffer`.
    /// A deadline already in the past fires immediately.
    fn arm_refresh_timer(&self, expires_at: DateTime<Utc>) {
        let deadline = expires_at - self.inner.session.refresh_buffer();
        let delay = (deadline - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);

        // The task holds only a weak reference so a pending timer never
        // keeps a dropped manager alive.
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            debug!("Proactive refresh timer fired");
            let _ = SessionManager { inner }.ensure_valid_token().await;
        });

        self.set_phase(RefreshPhase::Scheduled { at: deadline });
        if let Some(old) = self
            .inner
            .timer
            .lock()
            .expect("lock poisoned")
            .replace(handle)
        {
            old.abort();
        }
        debug!(fire_at = %deadline, "Refresh timer armed");
    }

    fn cancel_refresh_timer(&self) {
        if let Some(handle) = self.inner.timer.lock().expect("lock poisoned").take() {
            handle.abort();
        }
        self.set_phase(RefreshPhase::Idle);
    }

    fn phase(&self) -> RefreshPhase {
        *self.inner.phase.lock().expect("lock poisoned")
    }

    fn set_phase(&self, phase: RefreshPhase) {
        *self.inner.phase.lock().expect("lock poisoned") = phase;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.events.send(event);
    }
}

#[async_trait]
impl SessionAccess for SessionManager {
    fn is_logged_in(&self) -> bool {
        SessionManager::is_logged_in(self)
    }

    fn access_token(&self) -> Option<String> {
        SessionManager::access_token(self)
    }

    fn user(&self) -> Option<UserProfile> {
        SessionManager::user(self)
    }

    async fn ensure_valid_token(&self) -> Result<bool, AuthError> {
        Ok(SessionManager::ensure_valid_token(self).await)
    }

    async fn logout_silent(&self) {
        SessionManager::logout_silent(self);
    }
}

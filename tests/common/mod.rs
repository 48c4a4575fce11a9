//! Shared helpers for the integration suites.
//!
//! Each suite is its own binary, so not every helper is used everywhere.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use hasp::AuthStack;
use hasp::config::Config;
use hasp::session::token::{AuthBundle, UserProfile, role};
use hasp::shell::{MemoryNavigator, MemoryNotifier, StaticLocalizer};
use hasp::store::{CredentialRecord, CredentialStore, MemoryCredentialStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A fully wired stack pointed at a mock backend, with handles onto the
/// in-memory collaborators for assertions.
pub struct TestStack {
    pub server: MockServer,
    pub stack: AuthStack,
    pub store: Arc<MemoryCredentialStore>,
    pub navigator: Arc<MemoryNavigator>,
    pub notifier: Arc<MemoryNotifier>,
}

pub async fn stack_against_mock() -> TestStack {
    init_tracing();
    let server = MockServer::start().await;

    let mut config = Config::default();
    config.api.base_url = format!("{}/api", server.uri());

    let store = Arc::new(MemoryCredentialStore::new());
    let navigator = Arc::new(MemoryNavigator::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let stack = AuthStack::with_store(
        config,
        store.clone(),
        navigator.clone(),
        notifier.clone(),
        Arc::new(StaticLocalizer::english()),
    )
    .expect("stack wiring failed");

    TestStack {
        server,
        stack,
        store,
        navigator,
        notifier,
    }
}

/// Bundle the suites seed sessions from.
pub fn seeded_bundle(expires_in_secs: i64) -> AuthBundle {
    AuthBundle::with_expires_in(
        "seed-access",
        "seed-refresh",
        expires_in_secs,
        UserProfile::new("alice", &[role::USER]),
    )
}

/// Seed the store and restore the logged-in flag, without arming any timer.
pub async fn seed(t: &TestStack, expires_in_secs: i64) {
    let record = CredentialRecord::from_bundle(&seeded_bundle(expires_in_secs))
        .expect("seed bundle serializes");
    t.store.put_all(&record).expect("memory store write");
    t.stack.session.initialize().await;
}

/// Session payload in the shape `/login` and `/refresh-token` return.
pub fn session_payload(access: &str, refresh: &str, expires_in_secs: i64) -> serde_json::Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "Bearer",
        "expiresIn": expires_in_secs,
        "expiresAt": (chrono::Utc::now() + chrono::Duration::seconds(expires_in_secs)).to_rfc3339(),
        "user": {
            "username": "alice",
            "email": "alice@example.is",
            "roles": [role::USER],
        },
    })
}

pub async fn mount_refresh_success(
    server: &MockServer,
    access: &str,
    refresh: &str,
    expires_in_secs: i64,
) {
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_payload(access, refresh, expires_in_secs)),
        )
        .mount(server)
        .await;
}

pub async fn mount_refresh_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(json!({"message": "refresh rejected"})),
        )
        .mount(server)
        .await;
}

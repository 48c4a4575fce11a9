//! Session lifecycle against a mock backend.

mod common;

use std::time::Duration;

use futures::future::join_all;
use hasp::api::{AuthApi, HttpAuthApi, LoginRequest, RegisterRequest};
use hasp::net::ApiClient;
use hasp::shell::{ToastLevel, msg};
use hasp::store::CredentialKey;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{
    mount_refresh_failure, mount_refresh_success, seed, session_payload, stack_against_mock,
};

#[tokio::test]
async fn login_installs_the_returned_session() {
    let t = stack_against_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_partial_json(json!({"username": "alice"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_payload("login-access", "login-refresh", 3600)),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    let user = t
        .stack
        .session
        .login(&LoginRequest {
            username: "alice".into(),
            password: "hunter2".into(),
        })
        .await
        .expect("login succeeds");

    assert_eq!(user.username, "alice");
    assert!(t.stack.session.is_logged_in());
    assert_eq!(
        t.stack.session.access_token().as_deref(),
        Some("login-access")
    );
}

#[tokio::test]
async fn register_returns_the_profile_without_a_session() {
    let t = stack_against_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "username": "bob",
            "email": "bob@example.is",
            "roles": ["USER"],
        })))
        .expect(1)
        .mount(&t.server)
        .await;

    let api = HttpAuthApi::new(
        ApiClient::builder(&format!("{}/api", t.server.uri()))
            .build()
            .expect("client builds"),
    );
    let profile = api
        .register(&RegisterRequest {
            username: "bob".into(),
            email: "bob@example.is".into(),
            password: "hunter2".into(),
        })
        .await
        .expect("register succeeds");

    assert_eq!(profile.username, "bob");
    assert!(!t.stack.session.is_logged_in());
}

#[tokio::test]
async fn refresh_rotates_the_stored_pair() {
    let t = stack_against_mock().await;
    seed(&t, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .and(body_partial_json(json!({
            "accessToken": "seed-access",
            "refreshToken": "seed-refresh",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_payload("new-access", "new-refresh", 3600)),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    assert!(t.stack.session.ensure_valid_token().await);

    assert_eq!(t.stack.session.access_token().as_deref(), Some("new-access"));
    assert_eq!(
        t.stack.session.refresh_token().as_deref(),
        Some("new-refresh")
    );
}

#[tokio::test]
async fn fresh_token_never_touches_the_backend() {
    let t = stack_against_mock().await;
    seed(&t, 3600).await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&t.server)
        .await;

    assert!(t.stack.session.ensure_valid_token().await);
}

#[tokio::test]
async fn concurrent_validity_checks_share_one_backend_call() {
    let t = stack_against_mock().await;
    seed(&t, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_payload("new-access", "new-refresh", 3600))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let session = t.stack.session.clone();
            tokio::spawn(async move { session.ensure_valid_token().await })
        })
        .collect();
    let outcomes: Vec<bool> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task completes"))
        .collect();

    assert_eq!(outcomes, vec![true; 8]);
    assert_eq!(t.stack.session.access_token().as_deref(), Some("new-access"));
}

#[tokio::test]
async fn rejected_refresh_ends_the_session_with_a_warning() {
    let t = stack_against_mock().await;
    seed(&t, 10).await;
    mount_refresh_failure(&t.server, 401).await;

    assert!(!t.stack.session.ensure_valid_token().await);

    assert!(!t.stack.session.is_logged_in());
    assert!(t.store.is_empty());
    assert_eq!(t.navigator.current().as_deref(), Some("/auth/login"));
    assert_eq!(
        t.notifier.messages_at(ToastLevel::Warning),
        vec![msg::SESSION_EXPIRED.fallback.to_string()]
    );
}

#[tokio::test]
async fn backend_outage_keeps_the_session() {
    let t = stack_against_mock().await;
    seed(&t, 10).await;
    mount_refresh_failure(&t.server, 500).await;

    assert!(!t.stack.session.ensure_valid_token().await);

    assert!(t.stack.session.is_logged_in());
    assert_eq!(t.stack.session.access_token().as_deref(), Some("seed-access"));
    assert!(t.navigator.history().is_empty());
    assert_eq!(
        t.notifier.messages_at(ToastLevel::Error),
        vec![msg::REFRESH_FAILED.fallback.to_string()]
    );
}

#[tokio::test]
async fn malformed_refresh_payload_is_a_transient_failure() {
    let t = stack_against_mock().await;
    seed(&t, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .expect(1)
        .mount(&t.server)
        .await;

    assert!(!t.stack.session.ensure_valid_token().await);

    assert!(t.stack.session.is_logged_in());
    assert_eq!(t.stack.session.access_token().as_deref(), Some("seed-access"));
    assert_eq!(
        t.notifier.messages_at(ToastLevel::Error),
        vec![msg::REFRESH_FAILED.fallback.to_string()]
    );
}

#[tokio::test]
async fn half_seeded_store_cannot_refresh() {
    let t = stack_against_mock().await;
    let bundle = common::seeded_bundle(10);
    t.store.put_raw(CredentialKey::AccessToken, &bundle.access_token);
    t.store.put_raw(
        CredentialKey::ExpiresAt,
        bundle.expires_at.to_rfc3339(),
    );
    t.store
        .put_raw(CredentialKey::UserData, r#"{"username":"alice"}"#);
    t.stack.session.initialize().await;
    mount_refresh_success(&t.server, "new-access", "new-refresh", 3600).await;

    assert!(!t.stack.session.ensure_valid_token().await);

    assert_eq!(t.navigator.current().as_deref(), Some("/auth/login"));
    assert!(t.notifier.is_empty());
    assert!(
        t.server
            .received_requests()
            .await
            .expect("request recording enabled")
            .is_empty()
    );
}

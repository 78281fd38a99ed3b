mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use divisadero_api::store::Profile;
use serde_json::json;

#[tokio::test]
async fn invite_falls_back_to_generated_link_and_email() {
    let app = common::test_app();
    let token = common::forge_token("boss", "boss@example.com", json!({}));

    let (status, body) = common::post_authed(
        &app.router,
        "/org/acme/invite",
        &token,
        json!({"email": "newhire@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["user_id"], "invited-user-1");

    // Provider sent nothing, so the fallback ran exactly once.
    assert_eq!(app.identity.link_call_count(), 1);
    assert_eq!(app.mailer.sent_count(), 1);
    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent[0].to, "newhire@example.com");
    assert!(sent[0].html.contains("https://id.example/verify"));
    drop(sent);

    // Pending profile recorded with activation reset.
    let profile = app.store.profile("invited-user-1").expect("profile");
    assert!(!profile.is_activated);
    assert!(!profile.is_superuser);
    assert!(profile.org_id.is_some());

    // Org hints rode along in both metadata maps, plus the redirect target.
    let calls = app.identity.create_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].user_metadata["org_slug"], "acme");
    assert_eq!(calls[0].app_metadata["org_slug"], "acme");
    assert!(calls[0].user_metadata["org_id"].is_i64());
    assert!(calls[0].redirect_to.ends_with("/accept-invite"));
}

#[tokio::test]
async fn invite_skips_fallback_when_provider_already_emailed() {
    let app = common::test_app();
    app.identity.provider_sends_email.store(true, Ordering::SeqCst);
    let token = common::forge_token("boss", "boss@example.com", json!({}));

    let (status, _body) = common::post_authed(
        &app.router,
        "/org/acme/invite",
        &token,
        json!({"email": "newhire@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.identity.link_call_count(), 0);
    assert_eq!(app.mailer.sent_count(), 0);
    // The pending profile is still recorded.
    assert!(app.store.profile("invited-user-1").is_some());
}

#[tokio::test]
async fn invite_without_permission_is_403_and_calls_no_provider() {
    let mut config = common::test_config();
    config.allow_org_mismatch = false;
    let app = common::test_app_with_config(config);

    let home = app.store.seed_org("home");
    app.store.seed_org("acme");
    app.store.seed_profile(Profile {
        id: "outsider".to_string(),
        org_id: Some(home.org_id),
        is_activated: true,
        is_superuser: false,
    });
    let token = common::forge_token("outsider", "out@example.com", json!({}));

    let (status, body) = common::post_authed(
        &app.router,
        "/org/acme/invite",
        &token,
        json!({"email": "newhire@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    assert_eq!(app.identity.create_call_count(), 0);
    assert_eq!(app.identity.link_call_count(), 0);
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn invite_rejects_malformed_email() {
    let app = common::test_app();
    let token = common::forge_token("boss", "boss@example.com", json!({}));

    for email in ["", "not-an-email", "a@b@c.com", "x@nodot"] {
        let (status, body) = common::post_authed(
            &app.router,
            "/org/acme/invite",
            &token,
            json!({"email": email}),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "email {:?}", email);
        assert_eq!(body["field_errors"]["email"], "value is not a valid email address");
    }
    assert_eq!(app.identity.create_call_count(), 0);
}

#[tokio::test]
async fn invite_surfaces_already_registered_as_400() {
    let app = common::test_app();
    app.identity.already_registered.store(true, Ordering::SeqCst);
    let token = common::forge_token("boss", "boss@example.com", json!({}));

    let (status, body) = common::post_authed(
        &app.router,
        "/org/acme/invite",
        &token,
        json!({"email": "existing@example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "existing@example.com is already registered");
}

#[tokio::test]
async fn accept_reconciles_profile_from_token_metadata() {
    let app = common::test_app();
    let org = app.store.seed_org("acme");
    // org_id arrives as a string in the token metadata; it gets coerced.
    let token = common::forge_token(
        "joiner",
        "joiner@example.com",
        json!({"org_slug": "acme", "org_id": org.org_id.to_string()}),
    );

    let (status, body) = common::post_authed(&app.router, "/auth/accept", &token, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["org_id"], org.org_id);
    assert_eq!(body["org_slug"], "acme");

    let profile = app.store.profile("joiner").expect("profile");
    assert!(profile.is_activated);
    assert_eq!(profile.org_id, Some(org.org_id));
}

#[tokio::test]
async fn accept_resolves_org_from_slug_when_id_missing() {
    let app = common::test_app();
    let org = app.store.seed_org("acme");
    let token = common::forge_token("joiner", "joiner@example.com", json!({"org_slug": "acme"}));

    let (status, body) = common::post_authed(&app.router, "/auth/accept", &token, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["org_id"], org.org_id);
}

#[tokio::test]
async fn accept_without_determinable_org_is_400() {
    let app = common::test_app();
    let token = common::forge_token("joiner", "joiner@example.com", json!({}));

    let (status, body) = common::post_authed(&app.router, "/auth/accept", &token, json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

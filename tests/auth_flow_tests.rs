//! Credential-flow integration tests: registration, email verification,
//! login, bearer resolution, and password reset. These exercise positive
//! and negative paths end to end against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use cohort::clock::ManualClock;
use cohort::config::Config;
use cohort::identity::{
    AuthService, LoginRequest, RegisterRequest, RequestContext, SingleUseTokens, TokenIssuer,
};
use cohort::mailer::RecordingMailer;
use cohort::storage::MemoryStore;

struct Harness {
    store: Arc<MemoryStore>,
    mailer: RecordingMailer,
    clock: ManualClock,
    issuer: Arc<TokenIssuer>,
    auth: AuthService,
    tokens: SingleUseTokens,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let mailer = RecordingMailer::new();
    let clock = ManualClock::new(Utc::now());
    let config = Config::new("integration-secret").unwrap();
    let issuer = Arc::new(TokenIssuer::new(&config, Arc::new(clock.clone())));
    let auth = AuthService::new(
        store.clone(),
        Arc::new(mailer.clone()),
        Arc::new(clock.clone()),
        issuer.clone(),
    );
    let tokens = SingleUseTokens::new(
        store.clone(),
        Arc::new(mailer.clone()),
        Arc::new(clock.clone()),
        issuer.clone(),
        config.reset_ttl_secs,
    );
    Harness { store, mailer, clock, issuer, auth, tokens }
}

fn mailed_token(mailer: &RecordingMailer, index: usize) -> String {
    let html = mailer.sent()[index].html_body.clone();
    let start = html.find("token=").expect("mail carries a token") + "token=".len();
    let rest = &html[start..];
    let end = rest.find('"').unwrap();
    rest[..end].to_string()
}

#[test]
fn register_verify_login_roundtrip() {
    let h = harness();
    h.auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .unwrap();

    // Verify using the token that went out by mail
    let verification = mailed_token(&h.mailer, 0);
    let (verified, bearer) = h.tokens.redeem_verification(&verification).unwrap();
    assert!(verified.email_verified);

    // The verification response already signs the user in
    let header = format!("Bearer {bearer}");
    let ctx = RequestContext::from_bearer(Some(&header), &h.issuer, h.store.as_ref()).unwrap();
    assert_eq!(ctx.require_principal().unwrap().username, "alice");

    // A fresh login works too, and resolves back to alice
    let login = h
        .auth
        .login(&LoginRequest { username: "alice".into(), password: "password123".into() })
        .unwrap();
    let resolved = h.issuer.resolve(&login.token, h.store.as_ref()).unwrap();
    assert_eq!(resolved.username, "alice");
}

#[test]
fn login_before_verification_fails() {
    let h = harness();
    h.auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .unwrap();

    let err = h
        .auth
        .login(&LoginRequest { username: "alice".into(), password: "password123".into() })
        .unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
}

#[test]
fn bearer_token_expires_after_one_hour() {
    let h = harness();
    h.auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .unwrap();
    let verification = mailed_token(&h.mailer, 0);
    let (_user, bearer) = h.tokens.redeem_verification(&verification).unwrap();

    h.clock.advance(Duration::minutes(59));
    let header = format!("Bearer {bearer}");
    assert!(RequestContext::from_bearer(Some(&header), &h.issuer, h.store.as_ref()).is_ok());

    h.clock.advance(Duration::minutes(2));
    let err =
        RequestContext::from_bearer(Some(&header), &h.issuer, h.store.as_ref()).unwrap_err();
    assert_eq!(err.http_status(), 401);
}

#[test]
fn password_reset_roundtrip_and_single_use() {
    let h = harness();
    h.auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .unwrap();
    let verification = mailed_token(&h.mailer, 0);
    h.tokens.redeem_verification(&verification).unwrap();

    h.tokens.request_reset("alice@example.com").unwrap();
    let reset = mailed_token(&h.mailer, 1);
    h.tokens.redeem_reset(&reset, "brandnewpass1").unwrap();

    // Old password gone, new one works
    let old = LoginRequest { username: "alice".into(), password: "password123".into() };
    assert!(h.auth.login(&old).is_err());
    let new = LoginRequest { username: "alice".into(), password: "brandnewpass1".into() };
    assert!(h.auth.login(&new).is_ok());

    // Sequential second redemption always fails
    let err = h.tokens.redeem_reset(&reset, "yetanother1").unwrap_err();
    assert_eq!(err.http_status(), 401);
}

#[test]
fn password_reset_times_out_after_ten_minutes() {
    let h = harness();
    h.auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .unwrap();
    h.tokens.request_reset("alice@example.com").unwrap();
    let reset = mailed_token(&h.mailer, 1);

    h.clock.advance(Duration::minutes(11));
    let err = h.tokens.redeem_reset(&reset, "brandnewpass1").unwrap_err();
    assert_eq!(err.code_str(), "invalid_or_expired_token");
}

#[test]
fn reset_request_for_unknown_email_is_not_found() {
    let h = harness();
    let err = h.tokens.request_reset("nobody@example.com").unwrap_err();
    assert_eq!(err.http_status(), 404);
    assert!(h.mailer.sent().is_empty());
}

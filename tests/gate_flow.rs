//! End-to-end tests for the request gate.
//!
//! Flow Overview:
//! 1. Build the full router over in-memory stores with cheap Argon2 params.
//! 2. Drive register, login, profile and logout through `tower::ServiceExt::oneshot`.
//! 3. Check redirects, cookies, status codes and rendered pages.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, Response, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use passgate::api::{
    self,
    handlers::auth::{
        AuthConfig, AuthError, AuthState, CredentialVerifier, Identity, PasswordConfig,
        Registration, SESSION_COOKIE_NAME,
    },
};
use secrecy::SecretString;
use std::sync::Arc;
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";
const ALICE: &str = "username=alice&password=pw123%21&email=alice%40x.com&phone=5551234567";

fn config() -> AuthConfig {
    AuthConfig::new()
        .with_password_config(PasswordConfig::new(8, 1, 1))
        .with_session_cookie_secure(false)
}

fn app_with(config: &AuthConfig) -> Result<Router> {
    Ok(api::router(Arc::new(AuthState::in_memory(config)?)))
}

async fn post(app: &Router, uri: &str, body: &str, cookie: Option<&str>) -> Result<Response<Body>> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    Ok(app
        .clone()
        .oneshot(request.body(Body::from(body.to_string()))?)
        .await?)
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Result<Response<Body>> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    Ok(app.clone().oneshot(request.body(Body::empty())?).await?)
}

fn location(response: &Response<Body>) -> Option<&str> {
    response.headers().get(LOCATION).and_then(|v| v.to_str().ok())
}

fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `name=value` pair from a `Set-Cookie` header, ready for a `Cookie` header.
fn cookie_pair(response: &Response<Body>) -> Result<String> {
    let header = set_cookie(response).context("missing Set-Cookie")?;
    header
        .split(';')
        .next()
        .map(str::to_string)
        .context("empty Set-Cookie")
}

async fn body_text(response: Response<Body>) -> Result<String> {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn register_login_profile_logout() -> Result<()> {
    let app = app_with(&config())?;

    let registered = post(&app, "/register", ALICE, None).await?;
    assert_eq!(registered.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&registered), Some("/login"));
    assert!(set_cookie(&registered).is_some());

    let login = post(&app, "/login", "username=alice&password=pw123%21", None).await?;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&login), Some("/userprofile"));
    let cookie_header = set_cookie(&login).context("login must set a cookie")?;
    assert!(cookie_header.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
    assert!(cookie_header.contains("HttpOnly"));
    assert!(cookie_header.contains("Max-Age=60"));
    let cookie = cookie_pair(&login)?;

    let profile = get(&app, "/userprofile", Some(&cookie)).await?;
    assert_eq!(profile.status(), StatusCode::OK);
    let page = body_text(profile).await?;
    assert!(page.contains("alice"));
    assert!(page.contains("alice@x.com"));
    assert!(page.contains("5551234567"));
    assert!(!page.contains("pw123"));

    let home = get(&app, "/", Some(&cookie)).await?;
    assert!(body_text(home).await?.contains("Signed in as alice"));

    let logout = post(&app, "/logout", "", Some(&cookie)).await?;
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&logout), Some("/"));
    assert!(set_cookie(&logout).is_some_and(|c| c.contains("Max-Age=0")));

    // The old cookie no longer opens the profile.
    let after = get(&app, "/userprofile", Some(&cookie)).await?;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn anonymous_profile_redirects_to_login() -> Result<()> {
    let app = app_with(&config())?;

    let response = get(&app, "/userprofile", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let forged = format!("{SESSION_COOKIE_NAME}=not-a-real-token");
    let response = get(&app, "/userprofile", Some(&forged)).await?;
    assert_eq!(location(&response), Some("/login"));

    let home = get(&app, "/", None).await?;
    assert_eq!(home.status(), StatusCode::OK);
    assert!(body_text(home).await?.contains("not signed in"));
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let app = app_with(&config())?;
    post(&app, "/register", ALICE, None).await?;

    let wrong_password = post(&app, "/login", "username=alice&password=nope", None).await?;
    let unknown_user = post(&app, "/login", "username=mallory&password=nope", None).await?;
    let empty = post(&app, "/login", "username=&password=", None).await?;

    for response in [&wrong_password, &unknown_user, &empty] {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(response), Some("/login"));
        assert!(set_cookie(response).is_none());
    }
    Ok(())
}

#[tokio::test]
async fn registration_validation_and_duplicates() -> Result<()> {
    let app = app_with(&config())?;

    let invalid = post(
        &app,
        "/register",
        "username=bob&password=pw&email=bob.example.com&phone=12ab",
        None,
    )
    .await?;
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = body_text(invalid).await?;
    assert!(page.contains("Please enter a valid email"));
    assert!(page.contains("Phone number length must be 10 digits long"));
    assert!(page.contains("Please enter a valid phone number"));
    // Submitted values are echoed back.
    assert!(page.contains("value=\"bob\""));

    let first = post(&app, "/register", ALICE, None).await?;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let duplicate = post(&app, "/register", ALICE, None).await?;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert!(set_cookie(&duplicate).is_none());
    let page = body_text(duplicate).await?;
    assert!(page.contains("Registration failed"));
    assert!(!page.contains("already"));
    Ok(())
}

#[tokio::test]
async fn padded_usernames_are_trimmed() -> Result<()> {
    let app = app_with(&config())?;
    let padded = ALICE.replacen("username=alice", "username=%20alice%20", 1);
    let registered = post(&app, "/register", &padded, None).await?;
    assert_eq!(registered.status(), StatusCode::SEE_OTHER);

    // Same account whether or not the login form carries the padding.
    for form in ["username=alice&password=pw123%21", "username=alice%20&password=pw123%21"] {
        let login = post(&app, "/login", form, None).await?;
        assert_eq!(location(&login), Some("/userprofile"));
    }

    let duplicate = post(&app, "/register", ALICE, None).await?;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let blank = post(&app, "/login", "username=%20%20&password=pw123%21", None).await?;
    assert_eq!(location(&blank), Some("/login"));
    assert!(set_cookie(&blank).is_none());
    Ok(())
}

#[tokio::test]
async fn echoed_values_are_escaped() -> Result<()> {
    let app = app_with(&config())?;
    let response = post(
        &app,
        "/register",
        "username=%3Cscript%3Ealert(1)%3C%2Fscript%3E&password=&email=&phone=",
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = body_text(response).await?;
    assert!(page.contains("&lt;script&gt;"));
    assert!(!page.contains("<script>"));
    Ok(())
}

#[tokio::test]
async fn expired_session_is_anonymous() -> Result<()> {
    let app = app_with(&config().with_session_ttl_seconds(0))?;
    post(&app, "/register", ALICE, None).await?;

    let login = post(&app, "/login", "username=alice&password=pw123%21", None).await?;
    let cookie = cookie_pair(&login)?;

    let profile = get(&app, "/userprofile", Some(&cookie)).await?;
    assert_eq!(profile.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&profile), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn login_attempts_are_rate_limited() -> Result<()> {
    let app = app_with(&config().with_rate_limit(2, 3600))?;

    for _ in 0..2 {
        let response = post(&app, "/login", "username=a&password=b", None).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    let limited = post(&app, "/login", "username=a&password=b", None).await?;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(body_text(limited).await?.contains("Too many requests"));
    Ok(())
}

#[tokio::test]
async fn responses_carry_security_headers() -> Result<()> {
    let app = app_with(&config())?;
    let response = get(&app, "/login", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert_eq!(
        headers.get("x-frame-options").and_then(|v| v.to_str().ok()),
        Some("DENY")
    );
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn oversized_bodies_are_rejected() -> Result<()> {
    let app = app_with(&config())?;
    let body = format!("username={}&password=x", "a".repeat(20 * 1024));
    let response = post(&app, "/login", &body, None).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn health_reports_store() -> Result<()> {
    let app = app_with(&config())?;
    let response = get(&app, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    let health: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(health["store"], "ok");
    assert_eq!(health["name"], env!("CARGO_PKG_NAME"));
    Ok(())
}

/// Accepts any password for identities that exist.
struct TrustingVerifier {
    state: Arc<AuthState>,
}

#[async_trait]
impl CredentialVerifier for TrustingVerifier {
    async fn verify(&self, username: &str, _password: &SecretString) -> Result<Identity, AuthError> {
        self.state
            .credentials()
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }
}

#[tokio::test]
async fn verifier_can_be_swapped() -> Result<()> {
    // The lookup state shares nothing with the served state, so register in both.
    let config = config();
    let lookup = Arc::new(AuthState::in_memory(&config)?);
    let registration = Registration {
        username: "carol".to_string(),
        password: SecretString::from("correct-horse".to_string()),
        email: "carol@x.com".to_string(),
        phone: "5550000000".to_string(),
    };
    lookup.credentials().register(&registration).await?;

    let served = AuthState::in_memory(&config)?.with_verifier(Arc::new(TrustingVerifier {
        state: lookup.clone(),
    }));
    served.credentials().register(&registration).await?;
    let app = api::router(Arc::new(served));

    let login = post(&app, "/login", "username=carol&password=anything", None).await?;
    assert_eq!(location(&login), Some("/userprofile"));
    let cookie = cookie_pair(&login)?;

    let profile = get(&app, "/userprofile", Some(&cookie)).await?;
    assert_eq!(profile.status(), StatusCode::OK);
    assert!(body_text(profile).await?.contains("carol@x.com"));

    let rejected = post(&app, "/login", "username=dave&password=anything", None).await?;
    assert_eq!(location(&rejected), Some("/login"));
    Ok(())
}

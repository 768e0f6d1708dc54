//! Login form handlers.

use axum::{
    Form,
    extract::Extension,
    http::{Extensions, HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{
    error::AuthError,
    gate::LOGIN_PATH,
    identity::{Identity, deserialize_secret, empty_secret},
    rate_limit::{RateLimitAction, RateLimitDecision},
    state::AuthState,
    utils::extract_client_ip,
};
use crate::api::pages;

pub const PROFILE_PATH: &str = "/userprofile";

#[derive(ToSchema, Deserialize, Debug)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login form")
    ),
    tag = "auth"
)]
pub async fn login_form() -> Html<String> {
    Html(pages::login_page())
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to /userprofile with a session cookie on success, to /login otherwise"),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(username = %credentials.username))]
pub async fn login(
    headers: HeaderMap,
    extensions: Extensions,
    auth_state: Extension<Arc<AuthState>>,
    Form(credentials): Form<Credentials>,
) -> Response {
    let client_ip = extract_client_ip(&headers, &extensions);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return too_many_requests();
    }

    // Usernames are stored trimmed. Missing fields fail the same way as bad credentials.
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.expose_secret().is_empty() {
        debug!("Login form incomplete");
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let identity = match auth_state
        .verifier()
        .verify(username, &credentials.password)
        .await
    {
        Ok(identity) => identity,
        Err(AuthError::InvalidCredentials) => return Redirect::to(LOGIN_PATH).into_response(),
        Err(err) => return err.into_response(),
    };

    match start_session(&auth_state, &identity).await {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to(PROFILE_PATH)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Create a session and build its cookie.
pub(super) async fn start_session(
    auth_state: &AuthState,
    identity: &Identity,
) -> Result<HeaderValue, AuthError> {
    let sessions = auth_state.sessions();
    let token = sessions.create_session(identity).await?;
    sessions.session_cookie(&token).map_err(AuthError::store)
}

pub(super) fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Html(pages::error_page(StatusCode::TOO_MANY_REQUESTS)),
    )
        .into_response()
}

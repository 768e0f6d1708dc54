use axum::{
    Form,
    extract::Extension,
    http::{Extensions, HeaderMap, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    error::AuthError,
    gate::LOGIN_PATH,
    identity::Registration,
    login::{start_session, too_many_requests},
    rate_limit::{RateLimitAction, RateLimitDecision},
    state::AuthState,
    utils::extract_client_ip,
};
use crate::api::pages::{self, RegisterForm};

const REGISTRATION_FAILED: &str = "Registration failed. Please try again.";

#[utoipa::path(
    get,
    path = "/register",
    responses(
        (status = 200, description = "Registration form")
    ),
    tag = "auth"
)]
pub async fn register_form() -> Html<String> {
    Html(pages::register_page(&RegisterForm::default(), &[], None))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = Registration, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered and signed in; redirect to /login"),
        (status = 409, description = "Registration rejected by the store, generic message"),
        (status = 422, description = "Form re-rendered with field errors"),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(username = %registration.username))]
pub async fn register(
    headers: HeaderMap,
    extensions: Extensions,
    auth_state: Extension<Arc<AuthState>>,
    Form(registration): Form<Registration>,
) -> Response {
    let client_ip = extract_client_ip(&headers, &extensions);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return too_many_requests();
    }

    let form = RegisterForm {
        username: &registration.username,
        email: &registration.email,
        phone: &registration.phone,
    };

    let identity = match auth_state.credentials().register(&registration).await {
        Ok(identity) => identity,
        Err(AuthError::Validation(errors)) => {
            debug!("Registration rejected: {} field error(s)", errors.len());
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(pages::register_page(&form, &errors, None)),
            )
                .into_response();
        }
        Err(AuthError::DuplicateUsername) => {
            debug!("Registration conflict");
            return (
                StatusCode::CONFLICT,
                Html(pages::register_page(&form, &[], Some(REGISTRATION_FAILED))),
            )
                .into_response();
        }
        Err(err) => return err.into_response(),
    };

    // New accounts are signed in right away, then sent to the login page.
    match start_session(&auth_state, &identity).await {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to(LOGIN_PATH)).into_response(),
        Err(err) => err.into_response(),
    }
}

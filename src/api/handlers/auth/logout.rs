use axum::{
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::state::AuthState;

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Session destroyed, cookie cleared; redirect to /")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let sessions = auth_state.sessions();

    if let Some(token) = sessions.extract_session_token(&headers) {
        if let Err(err) = sessions.destroy_session(&token).await {
            error!("Failed to destroy session: {err}");
        }
    }

    // Logging out without a session still succeeds.
    match sessions.clear_session_cookie() {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response(),
        Err(err) => {
            error!("Failed to build logout cookie: {err}");
            Redirect::to("/").into_response()
        }
    }
}

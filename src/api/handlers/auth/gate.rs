//! Request gate: classify requests as authenticated or anonymous.
//!
//! Flow Overview: read the session cookie, resolve it through the session
//! manager and hand downstream handlers an [`AuthContext`]. Protected routes
//! sit behind [`require_authenticated`], which redirects anonymous requests to
//! the login page and exposes the [`Identity`] as a request extension.

use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{error::AuthError, identity::Identity, state::AuthState};

pub const LOGIN_PATH: &str = "/login";

/// Outcome of authenticating a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthContext {
    Authenticated(Identity),
    Anonymous,
}

impl AuthContext {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Resolve the session cookie in `headers`.
///
/// # Errors
/// Only storage failures are errors; a missing or dead session is
/// [`AuthContext::Anonymous`].
pub async fn authenticate_request(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<AuthContext, AuthError> {
    let sessions = auth_state.sessions();
    let token = sessions.extract_session_token(headers);
    Ok(match sessions.resolve_session(token.as_deref()).await? {
        Some(identity) => AuthContext::Authenticated(identity),
        None => AuthContext::Anonymous,
    })
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(auth_state) = Extension::<Arc<AuthState>>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        authenticate_request(&parts.headers, &auth_state)
            .await
            .map_err(IntoResponse::into_response)
    }
}

/// Middleware guarding routes that need a signed-in user.
///
/// # Errors
/// Storage failures render the generic error page.
pub async fn require_authenticated(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match authenticate_request(request.headers(), &auth_state).await? {
        AuthContext::Authenticated(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        AuthContext::Anonymous => {
            debug!(path = %request.uri().path(), "Anonymous request to protected route");
            Ok(Redirect::to(LOGIN_PATH).into_response())
        }
    }
}

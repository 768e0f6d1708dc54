//! Error taxonomy for registration, login and session handling.
//!
//! Missing or expired sessions are not errors: they resolve to an anonymous
//! context. Only [`AuthError::StoreUnavailable`] and [`AuthError::Hashing`]
//! are fatal for a request.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::api::pages;

/// A single rejected registration field and the message shown next to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    #[must_use]
    pub const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid registration input")]
    Validation(Vec<FieldError>),
    #[error("username already registered")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Wrap a storage failure.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::StoreUnavailable(err.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateUsername => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::StoreUnavailable(_) | Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Handlers translate the recoverable variants themselves; this is the
// fallback used by extractors and middleware.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Html(pages::error_page(status))).into_response()
    }
}

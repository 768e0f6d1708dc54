//! Auth handlers and supporting modules.
//!
//! This module coordinates registration, credential verification, sessions
//! and the request gate that protects routes.
//!
//! ## Sessions
//!
//! Session tokens are 32 random bytes, base64url encoded. Only
//! `SHA-256(secret || token)` is stored, so a leaked session table cannot be
//! replayed. Sessions live for a fixed TTL (one minute unless configured)
//! and expiry is checked on every lookup.
//!
//! ## Rate Limiting
//!
//! Login and registration attempts are limited per client IP, 100 attempts
//! per hour by default. Limited requests get `429 Too many requests`.

mod credentials;
mod error;
mod gate;
mod identity;
mod login;
mod logout;
mod password;
mod rate_limit;
mod register;
mod session;
mod state;
mod storage;
mod store;
mod utils;

pub use credentials::{CredentialStore, CredentialVerifier, PasswordVerifier};
pub use error::{AuthError, FieldError};
pub use gate::{AuthContext, LOGIN_PATH, authenticate_request, require_authenticated};
pub use identity::{Identity, IdentityRecord, Registration};
pub use login::{Credentials, PROFILE_PATH, login, login_form};
pub use logout::logout;
pub use password::{PasswordConfig, PasswordHasher};
pub use rate_limit::{
    NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter, WindowRateLimiter,
};
pub use register::{register, register_form};
pub use session::{SESSION_COOKIE_NAME, SessionConfig, SessionManager, SessionToken};
pub use state::{AuthConfig, AuthState};
pub use storage::{PgIdentityStore, PgSessionStore, apply_schema};
pub use store::{IdentityStore, MemoryIdentityStore, MemorySessionStore, SessionStore};

// utoipa path structs live next to the handlers.
pub(crate) use login::{__path_login, __path_login_form};
pub(crate) use logout::__path_logout;
pub(crate) use register::{__path_register, __path_register_form};

//! # Passgate (session-authenticated request gate)
//!
//! `passgate` serves registration, login, logout and a protected profile page.
//! Identities live in an [`IdentityStore`](api::handlers::auth::IdentityStore)
//! and sessions in a [`SessionStore`](api::handlers::auth::SessionStore); both
//! have a Postgres and an in-process implementation.
//!
//! ## Sessions
//!
//! A successful login mints a 32-byte random token that is returned to the
//! browser as an `HttpOnly` cookie. The server only stores a digest of the
//! token next to a serialized reference to the identity. Sessions expire after
//! a fixed TTL and are never renewed; expiry is checked when the cookie is
//! presented.
//!
//! ## Enumeration resistance
//!
//! Login failures for unknown users and wrong passwords are indistinguishable:
//! both take the same Argon2 verification path and both redirect back to
//! `/login` without detail.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

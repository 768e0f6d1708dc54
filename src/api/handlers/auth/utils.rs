//! Small helpers for auth validation and session token handling.

use anyhow::{Context, Result};
use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

const SESSION_TOKEN_BYTES: usize = 32;

/// Basic email format check.
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

pub(super) fn valid_phone_length(phone: &str) -> bool {
    phone.chars().count() == 10
}

pub(super) fn valid_phone_digits(phone: &str) -> bool {
    !phone.is_empty() && phone.chars().all(|c| c.is_ascii_digit())
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; storage keeps a digest.
pub(super) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Random secret used to key token digests when none is configured.
pub(super) fn generate_secret() -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session secret")?;
    Ok(bytes)
}

/// Cookies that cannot be a token we minted are rejected before any lookup.
pub(super) fn well_formed_session_token(token: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .is_ok_and(|bytes| bytes.len() == SESSION_TOKEN_BYTES)
}

/// Digest of a session token keyed with the server secret.
/// Only this value is used as the storage key.
pub(super) fn hash_session_token(secret: &[u8], token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(super) fn extract_client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if real_ip.is_some() {
        return real_ip.map(str::to_string);
    }
    // Direct connections: fall back to the peer address.
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

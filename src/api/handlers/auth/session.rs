//! Session lifecycle: mint, resolve and destroy cookie-backed sessions.
//!
//! A session is `Active` from creation until its TTL elapses (`Expired`) or
//! it is deleted at logout (`Destroyed`). Expiry is checked when a token is
//! resolved; nothing renews a session.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use secrecy::{ExposeSecret, SecretSlice};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

use super::{
    credentials::CredentialStore,
    error::AuthError,
    identity::Identity,
    store::SessionStore,
    utils::{generate_session_token, hash_session_token, well_formed_session_token},
};

pub const SESSION_COOKIE_NAME: &str = "passgate_session";
pub(super) const DEFAULT_SESSION_TTL_SECONDS: u64 = 60;

/// Cookie and lifetime settings for sessions.
#[derive(Debug)]
pub struct SessionConfig {
    cookie_name: String,
    ttl: Duration,
    secure: bool,
    secret: SecretSlice<u8>,
}

impl SessionConfig {
    /// Defaults: 60 second TTL, `Secure` cookies.
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            secure: true,
            secret: SecretSlice::from(secret),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

/// Raw session token as handed to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// What is persisted for a session: a reference, not the identity record.
#[derive(Debug, Serialize, Deserialize)]
struct SessionData {
    username: String,
}

pub struct SessionManager {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    credentials: CredentialStore,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn digest(&self, token: &str) -> Vec<u8> {
        hash_session_token(self.config.secret.expose_secret(), token)
    }

    /// Mint a session for an identity.
    ///
    /// # Errors
    /// Returns an error if the token cannot be generated or stored.
    #[instrument(skip(self, identity), fields(username = %identity.username))]
    pub async fn create_session(&self, identity: &Identity) -> Result<SessionToken, AuthError> {
        let token = generate_session_token().map_err(AuthError::store)?;
        let data = serde_json::to_string(&SessionData {
            username: identity.username.clone(),
        })
        .map_err(AuthError::store)?;

        self.store
            .insert(self.digest(&token), data, self.config.ttl)
            .await?;

        debug!("Session created");
        Ok(SessionToken(token))
    }

    /// Resolve a token to its identity.
    ///
    /// Missing, malformed, unknown and expired tokens all yield `Ok(None)`.
    ///
    /// # Errors
    /// Only storage failures are errors.
    pub async fn resolve_session(&self, token: Option<&str>) -> Result<Option<Identity>, AuthError> {
        let Some(token) = token.filter(|token| well_formed_session_token(token)) else {
            return Ok(None);
        };

        let Some(data) = self.store.lookup(&self.digest(token)).await? else {
            return Ok(None);
        };

        let data: SessionData = match serde_json::from_str(&data) {
            Ok(data) => data,
            Err(err) => {
                warn!("Discarding undecodable session data: {err}");
                return Ok(None);
            }
        };

        // The identity may have been removed since the session was minted.
        self.credentials.find_by_username(&data.username).await
    }

    /// Delete a session. Unknown, expired or malformed tokens are a no-op.
    ///
    /// # Errors
    /// Only storage failures are errors.
    pub async fn destroy_session(&self, token: &str) -> Result<(), AuthError> {
        if !well_formed_session_token(token) {
            return Ok(());
        }
        self.store.remove(&self.digest(token)).await
    }

    /// Build a secure `HttpOnly` cookie for the session token.
    ///
    /// # Errors
    /// Returns an error if the cookie is not a valid header value.
    pub fn session_cookie(&self, token: &SessionToken) -> Result<HeaderValue, InvalidHeaderValue> {
        let max_age = self.config.ttl.as_secs();
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            self.config.cookie_name,
            token.as_str()
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Build a cookie that removes the session cookie from the browser.
    ///
    /// # Errors
    /// Returns an error if the cookie is not a valid header value.
    pub fn clear_session_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.config.cookie_name
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Read the session token from the request cookies.
    #[must_use]
    pub fn extract_session_token(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.config.cookie_name)
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    // Browsers may send several Cookie headers; check them all.
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == name {
                let val = val.trim();
                return (!val.is_empty()).then(|| val.to_string());
            }
        }
    }
    None
}

//! Auth state and configuration.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{
    credentials::{CredentialStore, CredentialVerifier, PasswordVerifier},
    password::{PasswordConfig, PasswordHasher},
    rate_limit::{NoopRateLimiter, RateLimiter, WindowRateLimiter},
    session::{DEFAULT_SESSION_TTL_SECONDS, SessionConfig, SessionManager},
    store::{IdentityStore, MemoryIdentityStore, MemorySessionStore, SessionStore},
    utils::generate_secret,
};

const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: u64,
    session_cookie_secure: bool,
    session_secret: Option<SecretString>,
    password: PasswordConfig,
    rate_limit_max: u32,
    rate_limit_window_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: true,
            session_secret: None,
            password: PasswordConfig::default(),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_session_secret(mut self, secret: Option<SecretString>) -> Self {
        self.session_secret = secret;
        self
    }

    #[must_use]
    pub fn with_password_config(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    /// A `max` of zero disables rate limiting.
    #[must_use]
    pub fn with_rate_limit(mut self, max: u32, window_seconds: u64) -> Self {
        self.rate_limit_max = max;
        self.rate_limit_window_seconds = window_seconds;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    fn session_config(&self) -> Result<SessionConfig> {
        let secret = match &self.session_secret {
            Some(secret) => secret.expose_secret().as_bytes().to_vec(),
            None => {
                warn!("No session secret configured; sessions will not survive a restart");
                generate_secret()?
            }
        };
        Ok(SessionConfig::new(secret)
            .with_ttl(Duration::from_secs(self.session_ttl_seconds))
            .with_secure(self.session_cookie_secure))
    }

    fn rate_limiter(&self) -> Arc<dyn RateLimiter> {
        if self.rate_limit_max == 0 {
            Arc::new(NoopRateLimiter)
        } else {
            Arc::new(WindowRateLimiter::new(
                self.rate_limit_max,
                Duration::from_secs(self.rate_limit_window_seconds),
            ))
        }
    }
}

/// Everything handlers need to authenticate requests.
pub struct AuthState {
    credentials: CredentialStore,
    verifier: Arc<dyn CredentialVerifier>,
    sessions: SessionManager,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    /// Wire the stores into the credential store, verifier and session manager.
    ///
    /// # Errors
    /// Returns an error if a session secret has to be generated and the OS RNG fails.
    pub fn new(
        config: &AuthConfig,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let hasher = Arc::new(PasswordHasher::new(config.password));
        let credentials = CredentialStore::new(identities.clone(), hasher.clone());
        let verifier = Arc::new(PasswordVerifier::new(identities, hasher));
        let sessions = SessionManager::new(config.session_config()?, sessions, credentials.clone());

        Ok(Self {
            credentials,
            verifier,
            sessions,
            rate_limiter: config.rate_limiter(),
        })
    }

    /// State backed by in-process stores.
    ///
    /// # Errors
    /// See [`AuthState::new`].
    pub fn in_memory(config: &AuthConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(MemorySessionStore::new()),
        )
    }

    /// Swap the credential verification strategy.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.verifier.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::rate_limit::{RateLimitAction, RateLimitDecision};

    #[test]
    fn defaults_match_observed_configuration() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(config.session_cookie_secure());
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window_seconds, 3600);
    }

    #[test]
    fn session_config_follows_auth_config() -> Result<()> {
        let config = AuthConfig::new()
            .with_session_ttl_seconds(7200)
            .with_session_cookie_secure(false)
            .with_session_secret(Some(SecretString::from("secret".to_string())));
        let session = config.session_config()?;
        assert_eq!(session.ttl(), Duration::from_secs(7200));
        assert!(!session.secure());
        Ok(())
    }

    #[test]
    fn default_ttl_matches_session_config() {
        let session = SessionConfig::new(vec![0; 32]);
        assert_eq!(
            Duration::from_secs(AuthConfig::new().session_ttl_seconds()),
            session.ttl()
        );
    }

    #[test]
    fn zero_rate_limit_disables_limiter() {
        let limiter = AuthConfig::new().with_rate_limit(0, 60).rate_limiter();
        for _ in 0..10 {
            assert_eq!(
                limiter.check_ip(Some("1.2.3.4"), RateLimitAction::Login),
                RateLimitDecision::Allowed
            );
        }
    }

    #[test]
    fn in_memory_state_builds() -> Result<()> {
        let state = AuthState::in_memory(&AuthConfig::new())?;
        assert_eq!(state.sessions().config().ttl(), Duration::from_secs(60));
        Ok(())
    }
}

//! Credential store and verifier.
//!
//! Flow Overview: registration validates the submitted fields, hashes the
//! password with Argon2id and inserts the record; verification looks the user
//! up and checks the password. Unknown users and wrong passwords both surface
//! as [`AuthError::InvalidCredentials`].

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    error::AuthError,
    identity::{Identity, IdentityRecord, Registration},
    password::PasswordHasher,
    store::IdentityStore,
};

/// Registers identities and resolves them by username.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<PasswordHasher>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// Validate and persist a new identity.
    ///
    /// # Errors
    /// [`AuthError::Validation`] for malformed input (nothing is persisted),
    /// [`AuthError::DuplicateUsername`] if the username is taken, and store or
    /// hashing failures otherwise.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<Identity, AuthError> {
        registration.validate().map_err(AuthError::Validation)?;

        let password_hash = self.hasher.hash(&registration.password).await?;
        let identity = registration.identity();
        self.store
            .insert(IdentityRecord {
                identity: identity.clone(),
                password_hash,
            })
            .await?;

        debug!("Identity registered");
        Ok(identity)
    }

    /// Look up an identity by username.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] on storage failures.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self
            .store
            .find_by_username(username)
            .await?
            .map(|record| record.identity))
    }

    /// # Errors
    /// [`AuthError::StoreUnavailable`] when the backing store is unreachable.
    pub async fn ping(&self) -> Result<(), AuthError> {
        self.store.ping().await
    }
}

/// Checks presented credentials. Other strategies (OAuth, passkeys) can
/// implement the same trait.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// # Errors
    /// [`AuthError::InvalidCredentials`] when the username is unknown or the
    /// password does not match.
    async fn verify(&self, username: &str, password: &SecretString) -> Result<Identity, AuthError>;
}

/// Username and password verification against the identity store.
#[derive(Clone)]
pub struct PasswordVerifier {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<PasswordHasher>,
}

impl PasswordVerifier {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }
}

#[async_trait]
impl CredentialVerifier for PasswordVerifier {
    #[instrument(skip(self, password))]
    async fn verify(&self, username: &str, password: &SecretString) -> Result<Identity, AuthError> {
        let record = self.store.find_by_username(username).await?;
        let (identity, stored_hash) = match record {
            Some(record) => (Some(record.identity), Some(record.password_hash)),
            None => (None, None),
        };

        // Unknown users still pay for a verification so timing does not leak.
        let matched = self.hasher.verify(password, stored_hash).await?;
        match identity {
            Some(identity) if matched => Ok(identity),
            _ => {
                debug!("Credential verification failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{
        error::FieldError,
        identity::{MSG_EMAIL, MSG_PHONE_DIGITS, MSG_PHONE_LENGTH},
        password::fast_config,
        store::MemoryIdentityStore,
    };

    struct Fixture {
        store: Arc<MemoryIdentityStore>,
        credentials: CredentialStore,
        verifier: PasswordVerifier,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryIdentityStore::new());
        let hasher = Arc::new(PasswordHasher::new(fast_config()));
        Fixture {
            credentials: CredentialStore::new(store.clone(), hasher.clone()),
            verifier: PasswordVerifier::new(store.clone(), hasher),
            store,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn registration(username: &str, email: &str, phone: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: secret("pw123!"),
            email: email.to_string(),
            phone: phone.to_string(),
        }
    }

    fn field_messages(err: AuthError) -> Vec<&'static str> {
        match err {
            AuthError::Validation(errors) => errors.iter().map(|e: &FieldError| e.message).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_returns_identity_without_hash() -> Result<(), AuthError> {
        let fx = fixture();
        let identity = fx
            .credentials
            .register(&registration("alice", "alice@x.com", "5551234567"))
            .await?;

        assert_eq!(identity.username, "alice");
        assert_eq!(identity.email, "alice@x.com");
        assert_eq!(identity.phone, "5551234567");
        assert_eq!(
            fx.credentials.find_by_username("alice").await?,
            Some(identity)
        );
        Ok(())
    }

    #[tokio::test]
    async fn bad_phone_is_rejected_and_not_persisted() {
        let fx = fixture();
        for phone in ["555123456", "55512345678", "555123456a", "", "phone-here"] {
            let err = fx
                .credentials
                .register(&registration("alice", "alice@x.com", phone))
                .await
                .err();
            let messages = err.map(field_messages).unwrap_or_default();
            assert!(
                messages.contains(&MSG_PHONE_LENGTH) || messages.contains(&MSG_PHONE_DIGITS),
                "phone {phone:?} should be rejected"
            );
        }
        assert_eq!(fx.store.len().await, 0);
    }

    #[tokio::test]
    async fn bad_email_is_rejected() {
        let fx = fixture();
        for email in ["alice", "alice@", "@x.com", "alice@x", "a b@x.com"] {
            let err = fx
                .credentials
                .register(&registration("alice", email, "5551234567"))
                .await
                .err();
            assert_eq!(
                err.map(field_messages),
                Some(vec![MSG_EMAIL]),
                "email {email:?} should be rejected"
            );
        }
        assert_eq!(fx.store.len().await, 0);
    }

    #[tokio::test]
    async fn duplicate_username_keeps_one_identity() -> Result<(), AuthError> {
        let fx = fixture();
        fx.credentials
            .register(&registration("alice", "alice@x.com", "5551234567"))
            .await?;

        let second = fx
            .credentials
            .register(&registration("alice", "other@x.com", "5559876543"))
            .await;
        assert!(matches!(second, Err(AuthError::DuplicateUsername)));
        assert_eq!(fx.store.len().await, 1);
        assert_eq!(
            fx.credentials
                .find_by_username("alice")
                .await?
                .map(|identity| identity.email),
            Some("alice@x.com".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_accepts_correct_password() -> Result<(), AuthError> {
        let fx = fixture();
        fx.credentials
            .register(&registration("alice", "alice@x.com", "5551234567"))
            .await?;

        let identity = fx.verifier.verify("alice", &secret("pw123!")).await?;
        assert_eq!(identity.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail_identically() -> Result<(), AuthError> {
        let fx = fixture();
        fx.credentials
            .register(&registration("alice", "alice@x.com", "5551234567"))
            .await?;

        let wrong_password = fx.verifier.verify("alice", &secret("nope")).await;
        let unknown_user = fx.verifier.verify("mallory", &secret("pw123!")).await;

        let wrong_password = wrong_password.err().map(|e| e.to_string());
        let unknown_user = unknown_user.err().map(|e| e.to_string());
        assert_eq!(wrong_password, Some("invalid credentials".to_string()));
        assert_eq!(wrong_password, unknown_user);
        Ok(())
    }

    #[tokio::test]
    async fn verify_is_case_sensitive_on_username() -> Result<(), AuthError> {
        let fx = fixture();
        fx.credentials
            .register(&registration("alice", "alice@x.com", "5551234567"))
            .await?;

        assert!(matches!(
            fx.verifier.verify("Alice", &secret("pw123!")).await,
            Err(AuthError::InvalidCredentials)
        ));
        Ok(())
    }
}

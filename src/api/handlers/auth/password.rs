//! Argon2id password hashing.
//!
//! Hashing is deliberately expensive, so both hashing and verification run on
//! the blocking thread pool. Stored values are PHC strings that embed the salt
//! and parameters, so verification always uses the parameters a hash was
//! created with.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::OnceCell;

use super::error::AuthError;

/// Argon2 cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordConfig {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    #[must_use]
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn argon2(self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hashes and verifies passwords off the async worker threads.
#[derive(Debug)]
pub struct PasswordHasher {
    config: PasswordConfig,
    // Hash verified against when the username is unknown.
    decoy: OnceCell<String>,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(config: PasswordConfig) -> Self {
        Self {
            config,
            decoy: OnceCell::new(),
        }
    }

    /// Produce a salted PHC string for the password.
    ///
    /// # Errors
    /// Returns [`AuthError::Hashing`] if the parameters are invalid or the
    /// blocking task fails.
    pub async fn hash(&self, password: &SecretString) -> Result<String, AuthError> {
        let config = self.config;
        let password = password.clone();
        tokio::task::spawn_blocking(move || hash_blocking(config, &password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    /// Verify a password against a stored hash.
    ///
    /// With no stored hash the password is checked against a decoy so the
    /// caller pays the same cost and always gets `false`.
    ///
    /// # Errors
    /// Returns [`AuthError::Hashing`] only when hashing infrastructure fails.
    pub async fn verify(
        &self,
        password: &SecretString,
        stored: Option<String>,
    ) -> Result<bool, AuthError> {
        let known = stored.is_some();
        let phc = match stored {
            Some(phc) => phc,
            None => self.decoy().await?.to_string(),
        };
        let password = password.clone();
        let matched = tokio::task::spawn_blocking(move || verify_blocking(&phc, &password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(known && matched)
    }

    async fn decoy(&self) -> Result<&String, AuthError> {
        self.decoy
            .get_or_try_init(|| async {
                self.hash(&SecretString::from("passgate-decoy-password".to_string()))
                    .await
            })
            .await
    }
}

fn hash_blocking(config: PasswordConfig, password: &SecretString) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = config
        .argon2()?
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_blocking(phc: &str, password: &SecretString) -> bool {
    // Parameters come from the PHC string, not from the current config.
    PasswordHash::new(phc).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
pub(crate) fn fast_config() -> PasswordConfig {
    PasswordConfig::new(Params::MIN_M_COST.max(8), 1, 1)
}

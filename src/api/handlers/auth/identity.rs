//! Identity records and registration input validation.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::{
    error::FieldError,
    utils::{valid_email, valid_phone_digits, valid_phone_length},
};

pub(crate) const MSG_USERNAME: &str = "Please enter a username";
pub(crate) const MSG_PASSWORD: &str = "Please enter a password";
pub(crate) const MSG_EMAIL: &str = "Please enter a valid email";
pub(crate) const MSG_PHONE_LENGTH: &str = "Phone number length must be 10 digits long";
pub(crate) const MSG_PHONE_DIGITS: &str = "Please enter a valid phone number";

/// A registered account as seen by handlers. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub phone: String,
}

/// Persisted form of an identity, including its Argon2 PHC string.
#[derive(Clone)]
pub struct IdentityRecord {
    pub identity: Identity,
    pub password_hash: String,
}

impl std::fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("identity", &self.identity)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Registration form submission.
#[derive(ToSchema, Deserialize, Debug)]
pub struct Registration {
    #[serde(default)]
    pub username: String,
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

pub(super) fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

pub(super) fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Registration {
    /// Check every field and collect all violations.
    ///
    /// # Errors
    /// Returns the list of field errors when any constraint fails.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.username.trim().is_empty() {
            errors.push(FieldError::new("username", MSG_USERNAME));
        }
        if self.password.expose_secret().is_empty() {
            errors.push(FieldError::new("password", MSG_PASSWORD));
        }
        if !valid_email(&self.email) {
            errors.push(FieldError::new("email", MSG_EMAIL));
        }
        // Both phone checks run so a short, non-numeric value reports both.
        if !valid_phone_length(&self.phone) {
            errors.push(FieldError::new("phone", MSG_PHONE_LENGTH));
        }
        if !valid_phone_digits(&self.phone) {
            errors.push(FieldError::new("phone", MSG_PHONE_DIGITS));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Surrounding whitespace is not part of a username.
    pub(super) fn identity(&self) -> Identity {
        Identity {
            username: self.username.trim().to_string(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

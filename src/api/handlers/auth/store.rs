//! Storage seams for identities and sessions, plus in-process implementations.
//!
//! The in-process stores back development runs without a database and the
//! test suite. Postgres implementations live in `storage.rs`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{error::AuthError, identity::IdentityRecord};

/// Persistence for registered identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity.
    ///
    /// # Errors
    /// [`AuthError::DuplicateUsername`] if the username is taken,
    /// [`AuthError::StoreUnavailable`] on storage failures.
    async fn insert(&self, record: IdentityRecord) -> Result<(), AuthError>;

    /// Look up an identity by its exact (case-sensitive) username.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] on storage failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<IdentityRecord>, AuthError>;

    /// Check that the store is reachable.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] when it is not.
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Persistence for session records keyed by token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store serialized session data that expires after `ttl`.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] on storage failures.
    async fn insert(&self, digest: Vec<u8>, data: String, ttl: Duration) -> Result<(), AuthError>;

    /// Return the data of an unexpired session.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] on storage failures.
    async fn lookup(&self, digest: &[u8]) -> Result<Option<String>, AuthError>;

    /// Delete a session. Deleting a missing session succeeds.
    ///
    /// # Errors
    /// [`AuthError::StoreUnavailable`] on storage failures.
    async fn remove(&self, digest: &[u8]) -> Result<(), AuthError>;
}

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<String, IdentityRecord>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn insert(&self, record: IdentityRecord) -> Result<(), AuthError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.identity.username) {
            return Err(AuthError::DuplicateUsername);
        }
        records.insert(record.identity.username.clone(), record);
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<IdentityRecord>, AuthError> {
        Ok(self.records.read().await.get(username).cloned())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[derive(Debug)]
struct MemorySession {
    data: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, digest: Vec<u8>, data: String, ttl: Duration) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            digest,
            MemorySession {
                data,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn lookup(&self, digest: &[u8]) -> Result<Option<String>, AuthError> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(digest) {
                None => return Ok(None),
                Some(session) if session.expires_at > Instant::now() => {
                    return Ok(Some(session.data.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: drop it so it can never resolve again.
        self.sessions.write().await.remove(digest);
        Ok(None)
    }

    async fn remove(&self, digest: &[u8]) -> Result<(), AuthError> {
        self.sessions.write().await.remove(digest);
        Ok(())
    }
}

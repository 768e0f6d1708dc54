//! Postgres-backed identity and session stores.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use std::time::Duration;
use tracing::{Instrument, debug};

use super::{
    error::AuthError,
    identity::{Identity, IdentityRecord},
    store::{IdentityStore, SessionStore},
    utils::is_unique_violation,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Create the tables if they do not exist yet.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &PgPool) -> anyhow::Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, record: IdentityRecord) -> Result<(), AuthError> {
        let query = r"
            INSERT INTO identities (username, password_hash, email, phone)
            VALUES ($1, $2, $3, $4)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&record.identity.username)
            .bind(&record.password_hash)
            .bind(&record.identity.email)
            .bind(&record.identity.phone)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::DuplicateUsername),
            Err(err) => Err(AuthError::store(
                anyhow::Error::new(err).context("failed to insert identity"),
            )),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<IdentityRecord>, AuthError> {
        let query = "SELECT username, password_hash, email, phone FROM identities WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup identity")
            .map_err(AuthError::store)?;

        Ok(row.map(|row| IdentityRecord {
            identity: Identity {
                username: row.get("username"),
                email: row.get("email"),
                phone: row.get("phone"),
            },
            password_hash: row.get("password_hash"),
        }))
    }

    async fn ping(&self) -> Result<(), AuthError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")
            .map_err(AuthError::store)?;

        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
            .map_err(AuthError::store)
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, digest: Vec<u8>, data: String, ttl: Duration) -> Result<(), AuthError> {
        let ttl_seconds = i64::try_from(ttl.as_secs())
            .context("session ttl out of range")
            .map_err(AuthError::store)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin session transaction")
            .map_err(AuthError::store)?;

        // Drop expired rows so the table only holds sessions that can still resolve.
        let prune = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let prune_span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = prune
        );
        let pruned = sqlx::query(prune)
            .execute(&mut *tx)
            .instrument(prune_span)
            .await
            .context("failed to prune expired sessions")
            .map_err(AuthError::store)?;
        if pruned.rows_affected() > 0 {
            debug!(pruned = pruned.rows_affected(), "Pruned expired sessions");
        }

        let query = r"
            INSERT INTO sessions (session_hash, data, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(digest)
            .bind(data)
            .bind(ttl_seconds)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert session")
            .map_err(AuthError::store)?;

        tx.commit()
            .await
            .context("failed to commit session")
            .map_err(AuthError::store)?;
        Ok(())
    }

    async fn lookup(&self, digest: &[u8]) -> Result<Option<String>, AuthError> {
        // Only unexpired sessions resolve; expiry is never extended here.
        let query = r"
            SELECT data
            FROM sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(digest)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
            .map_err(AuthError::store)?;

        Ok(row.map(|row| row.get("data")))
    }

    async fn remove(&self, digest: &[u8]) -> Result<(), AuthError> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(digest)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")
            .map_err(AuthError::store)?;
        Ok(())
    }
}

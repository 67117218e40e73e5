//! Issued token storage for validation and revocation.
//!
//! Every access and refresh token has a row keyed by its JTI. A signed token
//! is only honored while its row exists and has not expired.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::{format_datetime, parse_datetime};
use crate::jwt::TokenKind;

/// A stored token record.
#[derive(Debug, Clone)]
pub struct StoredToken {
    pub id: String,
    pub user_id: i64,
    pub kind: TokenKind,
    pub expires_at: String,
    pub created_at: String,
}

impl StoredToken {
    /// Whether the stored expiry has passed at `now`.
    /// An unparseable expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match parse_datetime(&self.expires_at) {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    user_id: i64,
    kind: String,
    expires_at: String,
    created_at: String,
}

impl TryFrom<TokenRow> for StoredToken {
    type Error = sqlx::Error;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let kind = TokenKind::from_str(&row.kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown token kind: {}", row.kind).into()))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// A token row to insert.
#[derive(Debug, Clone)]
pub struct NewToken<'a> {
    pub id: &'a str,
    pub user_id: i64,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Store for managing issued tokens.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert several token records in one transaction.
    /// Either every row is written or none is.
    pub async fn create_batch(&self, tokens: &[NewToken<'_>]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for token in tokens {
            sqlx::query("INSERT INTO tokens (id, user_id, kind, expires_at) VALUES (?, ?, ?, ?)")
                .bind(token.id)
                .bind(token.user_id)
                .bind(token.kind.as_str())
                .bind(format_datetime(token.expires_at))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a token by its JWT ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<StoredToken>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT id, user_id, kind, expires_at, created_at FROM tokens WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredToken::try_from).transpose()
    }

    /// List all token records for a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<StoredToken>, sqlx::Error> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            "SELECT id, user_id, kind, expires_at, created_at FROM tokens WHERE user_id = ? ORDER BY created_at DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredToken::try_from).collect()
    }

    /// Delete a token by its JWT ID (revoke).
    pub async fn delete_by_id(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a token by its JWT ID only if it belongs to the given user.
    pub async fn delete_by_id_for_user(&self, id: &str, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all tokens for a user (logout everywhere).
    pub async fn delete_all_by_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all tokens that expired before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < ?")
            .bind(format_datetime(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Long-lived API keys.
//!
//! Keys are independent of the token table: they are never swept, and their
//! expiry is checked only when a request presents them.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::{format_datetime, parse_datetime};

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub key: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl ApiKey {
    /// Whether the key has an expiry that has passed at `now`.
    /// Keys without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at.as_deref() {
            None => false,
            Some(raw) => match parse_datetime(raw) {
                Some(expires_at) => expires_at <= now,
                None => true,
            },
        }
    }

    /// Key with everything but the first and last four characters hidden.
    pub fn masked_key(&self) -> String {
        if self.key.len() <= 8 {
            return "*".repeat(self.key.len());
        }
        format!(
            "{}{}{}",
            &self.key[..4],
            "*".repeat(self.key.len() - 8),
            &self.key[self.key.len() - 4..]
        )
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: i64,
    user_id: i64,
    name: String,
    key: String,
    expires_at: Option<String>,
    last_used_at: Option<String>,
    is_active: i32,
    created_at: String,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            key: row.key,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            is_active: row.is_active != 0,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyStore {
    pool: SqlitePool,
}

impl ApiKeyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new active key. Returns the key ID.
    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO api_keys (user_id, name, key, expires_at) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(name)
                .bind(key)
                .bind(expires_at.map(format_datetime))
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a key by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ApiKey>, sqlx::Error> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            "SELECT id, user_id, name, key, expires_at, last_used_at, is_active, created_at
             FROM api_keys WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApiKey::from))
    }

    /// Find an active key by exact key string. Expiry is left to the caller.
    pub async fn get_active_by_key(&self, key: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            "SELECT id, user_id, name, key, expires_at, last_used_at, is_active, created_at
             FROM api_keys WHERE key = ? AND is_active = 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApiKey::from))
    }

    /// List a user's keys, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<ApiKey>, sqlx::Error> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(
            "SELECT id, user_id, name, key, expires_at, last_used_at, is_active, created_at
             FROM api_keys WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    /// Delete a key owned by the given user.
    pub async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record that a key was just used.
    pub async fn touch_last_used(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Activate or deactivate a key.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE api_keys SET is_active = ? WHERE id = ?")
            .bind(active as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

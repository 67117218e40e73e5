//! Issuance, validation and revocation of access/refresh token pairs.
//!
//! A signed token is only honored while its row exists in the token table.
//! Deleting the row revokes the token regardless of its embedded expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::TokenError;
use crate::db::{Database, NewToken};
use crate::jwt::{Claims, JwtConfig, TokenKind};

/// A freshly issued pair of signed tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    jwt: Arc<JwtConfig>,
    db: Database,
}

impl TokenService {
    pub fn new(jwt: Arc<JwtConfig>, db: Database) -> Self {
        Self { jwt, db }
    }

    /// Issue an access/refresh pair and record both rows.
    pub async fn issue_pair(&self, user_id: i64, email: &str) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(user_id, email, Utc::now()).await
    }

    /// Issue a pair as of `now`. Both rows are written in one transaction;
    /// if that fails the signed strings are dropped.
    pub async fn issue_pair_at(
        &self,
        user_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access = Claims::new(user_id, email, TokenKind::Access, now);
        let refresh = Claims::new(user_id, email, TokenKind::Refresh, now);

        let access_token = self.jwt.sign(&access)?;
        let refresh_token = self.jwt.sign(&refresh)?;

        self.db
            .tokens()
            .create_batch(&[row_for(&access)?, row_for(&refresh)?])
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Validate a token of any kind against the current time.
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now()).await
    }

    /// Validate a token against `now`: signature first, then the embedded
    /// expiry, then the stored row, whose expiry is authoritative.
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.jwt.decode(token)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        let stored = self
            .db
            .tokens()
            .get_by_id(&claims.jti)
            .await?
            .ok_or(TokenError::NotFoundOrRevoked)?;

        if stored.user_id != claims.user_id {
            return Err(TokenError::NotFoundOrRevoked);
        }
        if stored.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Validate a token and require it to be of the given kind.
    pub async fn validate_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.validate_kind_at(token, kind, Utc::now()).await
    }

    pub async fn validate_kind_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = self.validate_at(token, now).await?;
        if claims.token_type != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Ok(claims)
    }

    /// Redeem a refresh token: it is revoked and a new pair is issued.
    /// A refresh token can be redeemed at most once.
    pub async fn rotate(&self, refresh_token: &str) -> Result<(Claims, TokenPair), TokenError> {
        let claims = self.validate_kind(refresh_token, TokenKind::Refresh).await?;

        if !self.db.tokens().delete_by_id(&claims.jti).await? {
            return Err(TokenError::NotFoundOrRevoked);
        }

        let pair = self.issue_pair(claims.user_id, &claims.email).await?;
        Ok((claims, pair))
    }

    /// Revoke a single token. The signature must verify but expiry is
    /// ignored. Returns whether a row was deleted; a token whose ID cannot
    /// be recovered is a no-op.
    pub async fn revoke_token(&self, token: &str) -> Result<bool, TokenError> {
        let Ok(claims) = self.jwt.decode(token) else {
            return Ok(false);
        };
        Ok(self.db.tokens().delete_by_id(&claims.jti).await?)
    }

    /// Revoke a single token only if it belongs to `user_id`.
    pub async fn revoke_token_for_user(&self, token: &str, user_id: i64) -> Result<bool, TokenError> {
        let Ok(claims) = self.jwt.decode(token) else {
            return Ok(false);
        };
        if claims.user_id != user_id {
            return Ok(false);
        }
        Ok(self
            .db
            .tokens()
            .delete_by_id_for_user(&claims.jti, user_id)
            .await?)
    }

    /// Revoke a token by its ID, as bound to an authenticated request.
    pub async fn revoke_id_for_user(&self, token_id: &str, user_id: i64) -> Result<bool, TokenError> {
        Ok(self
            .db
            .tokens()
            .delete_by_id_for_user(token_id, user_id)
            .await?)
    }

    /// Revoke every token of a user. Returns the number of rows deleted.
    pub async fn revoke_all_user_tokens(&self, user_id: i64) -> Result<u64, TokenError> {
        Ok(self.db.tokens().delete_all_by_user(user_id).await?)
    }

    /// Delete rows whose expiry is before `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        Ok(self.db.tokens().delete_expired(now).await?)
    }
}

fn row_for(claims: &Claims) -> Result<NewToken<'_>, TokenError> {
    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| TokenError::Signing(format!("expiry out of range: {}", claims.exp)))?;
    Ok(NewToken {
        id: &claims.jti,
        user_id: claims.user_id,
        kind: claims.token_type,
        expires_at,
    })
}

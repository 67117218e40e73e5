//! Request gate binding an [`AuthContext`] to each authenticated request.
//!
//! The policy is chosen per route group when the router is built. Handlers
//! behind the gate read the identity through the [`Auth`](super::Auth)
//! extractor.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};

use super::cookie::{ACCESS_COOKIE_NAME, api_key, bearer_token, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::tokens::TokenService;
use super::types::{AuthContext, AuthMethod};
use crate::db::Database;
use crate::jwt::TokenKind;

/// Which credentials a route group accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Access token from the Authorization header or the access cookie
    Bearer,
    /// `X-API-Key` header only. No route group uses it on its own yet;
    /// finance routes reach key checks through `Either`.
    ApiKey,
    /// Authorization header if present, otherwise `X-API-Key`
    Either,
}

/// State for the auth gate.
#[derive(Clone)]
pub struct AuthGate {
    pub tokens: TokenService,
    pub db: Database,
    pub policy: AuthPolicy,
}

impl AuthGate {
    pub fn new(tokens: TokenService, db: Database, policy: AuthPolicy) -> Self {
        Self { tokens, db, policy }
    }

    /// Same backends, different policy.
    pub fn with_policy(&self, policy: AuthPolicy) -> Self {
        Self {
            policy,
            ..self.clone()
        }
    }
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiAuthError> {
    let context = authenticate(&gate, request.headers()).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

async fn authenticate(gate: &AuthGate, headers: &HeaderMap) -> Result<AuthContext, ApiAuthError> {
    match gate.policy {
        AuthPolicy::Bearer => authenticate_bearer(gate, headers).await,
        AuthPolicy::ApiKey => authenticate_api_key(gate, headers).await,
        AuthPolicy::Either => {
            if headers.contains_key(header::AUTHORIZATION) {
                authenticate_bearer(gate, headers).await
            } else if api_key(headers).is_some() {
                authenticate_api_key(gate, headers).await
            } else {
                Err(ApiAuthError::new(AuthErrorKind::NotAuthenticated))
            }
        }
    }
}

async fn authenticate_bearer(
    gate: &AuthGate,
    headers: &HeaderMap,
) -> Result<AuthContext, ApiAuthError> {
    let token = if headers.contains_key(header::AUTHORIZATION) {
        bearer_token(headers).ok_or_else(|| {
            debug!("Malformed Authorization header");
            ApiAuthError::new(AuthErrorKind::InvalidCredential)
        })?
    } else {
        get_cookie(headers, ACCESS_COOKIE_NAME)
            .filter(|t| !t.is_empty())
            .ok_or(ApiAuthError::new(AuthErrorKind::NotAuthenticated))?
    };

    let claims = gate.tokens.validate_kind(token, TokenKind::Access).await?;

    Ok(AuthContext {
        user_id: claims.user_id,
        email: Some(claims.email),
        method: AuthMethod::Bearer,
        token_id: Some(claims.jti),
    })
}

async fn authenticate_api_key(
    gate: &AuthGate,
    headers: &HeaderMap,
) -> Result<AuthContext, ApiAuthError> {
    let key = api_key(headers).ok_or(ApiAuthError::new(AuthErrorKind::NotAuthenticated))?;

    let record = gate
        .db
        .api_keys()
        .get_active_by_key(key)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up API key: {}", e);
            ApiAuthError::new(AuthErrorKind::DatabaseError)
        })?
        .ok_or_else(|| {
            debug!("Unknown or inactive API key");
            ApiAuthError::new(AuthErrorKind::InvalidCredential)
        })?;

    if record.is_expired_at(Utc::now()) {
        debug!(key_id = record.id, "Expired API key");
        return Err(ApiAuthError::new(AuthErrorKind::InvalidCredential));
    }

    // Not awaited: the request never waits on the bookkeeping write
    let store = gate.db.api_keys();
    let key_id = record.id;
    tokio::spawn(async move {
        if let Err(e) = store.touch_last_used(key_id).await {
            warn!(key_id, "Failed to update API key last use: {}", e);
        }
    });

    Ok(AuthContext {
        user_id: record.user_id,
        email: None,
        method: AuthMethod::ApiKey,
        token_id: None,
    })
}

//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::jwt::{JwtError, TokenKind};

/// Why a token could not be issued, validated or revoked.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token not found or revoked")]
    NotFoundOrRevoked,

    #[error("Token expired")]
    Expired,

    #[error("Expected a {} token", .expected.as_str())]
    WrongKind { expected: TokenKind },

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Token persistence failed: {0}")]
    PersistenceFailure(#[from] sqlx::Error),
}

impl TokenError {
    /// Whether the error is the caller's fault rather than the server's.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            TokenError::Signing(_) | TokenError::PersistenceFailure(_)
        )
    }
}

impl From<JwtError> for TokenError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Encoding(e) => TokenError::Signing(e.to_string()),
            JwtError::Malformed(_) => TokenError::MalformedToken,
            JwtError::InvalidSignature(_) => TokenError::InvalidSignature,
        }
    }
}

/// Internal auth error kind used by the request gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidCredential,
    DatabaseError,
}

/// API authentication errors, rendered as JSON.
/// Every rejected credential gets the same message.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::InvalidCredential => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidCredential => "Invalid or expired token",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }
}

impl From<TokenError> for ApiAuthError {
    fn from(e: TokenError) -> Self {
        if e.is_rejection() {
            debug!(error = %e, "Token rejected");
            Self::new(AuthErrorKind::InvalidCredential)
        } else {
            error!(error = %e, "Token check failed");
            Self::new(AuthErrorKind::DatabaseError)
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

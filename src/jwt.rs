//! JWT signing and decoding for access and refresh tokens.
//!
//! Both token kinds carry the same claim set and are tracked in the database
//! by their JTI. Expiry is not checked here: callers compare `exp` against
//! their own clock so that the stored token row stays the authority.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token (15 minutes)
    Access,
    /// Long-lived refresh token (7 days)
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            _ => None,
        }
    }

    /// Lifetime of this kind of token in seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            TokenKind::Access => ACCESS_TOKEN_DURATION_SECS,
            TokenKind::Refresh => REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Database user ID
    pub user_id: i64,
    /// Email the user had when the token was issued
    pub email: String,
    /// JWT ID, mirrored as the primary key of the token row
    pub jti: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Build claims for a new token of the given kind issued at `now`.
    pub fn new(user_id: i64, email: &str, kind: TokenKind, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            user_id,
            email: email.to_string(),
            jti: generate_jti(kind, user_id, now),
            token_type: kind,
            iat,
            exp: iat + kind.duration_secs(),
        }
    }

    /// Whether the embedded expiry has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: i64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

/// Build a token ID from its kind, owner and the issue instant.
/// The random suffix keeps IDs distinct when two pairs are issued within the
/// clock's resolution.
fn generate_jti(kind: TokenKind, user_id: i64, now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
    format!(
        "{}_{}_{}_{:08x}",
        kind.as_str(),
        user_id,
        nanos,
        rand::random::<u32>()
    )
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign claims with HS256.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Decode a token and verify its signature.
    /// Only HS256 is accepted. The `exp` claim must be present but is not
    /// compared against the system clock.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify_decode_error)
    }
}

fn classify_decode_error(e: jsonwebtoken::errors::Error) -> JwtError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => JwtError::Malformed(e),
        _ => JwtError::InvalidSignature(e),
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token could not be split or its segments could not be parsed
    Malformed(jsonwebtoken::errors::Error),
    /// Signature did not verify or the algorithm was not HS256
    InvalidSignature(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Malformed(e) => write!(f, "Malformed token: {}", e),
            JwtError::InvalidSignature(e) => write!(f, "Invalid token signature: {}", e),
        }
    }
}

impl std::error::Error for JwtError {}

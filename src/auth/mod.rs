//! Authentication for API routes.
//!
//! Paired tokens: short-lived access tokens (15 min) and long-lived refresh
//! tokens (7 days), both tracked in the database by JTI so that either can be
//! revoked. API keys are a separate long-lived credential. A per-route-group
//! gate accepts bearer tokens, API keys, or either.

mod cookie;
mod errors;
mod extractors;
mod middleware;
mod password;
mod tokens;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, API_KEY_HEADER, REFRESH_COOKIE_NAME, auth_cookie, clear_cookie, get_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind, TokenError};
pub use extractors::Auth;
pub use middleware::{AuthGate, AuthPolicy, require_auth};
pub use password::{hash_password, verify_password};
pub use tokens::{TokenPair, TokenService};
pub use types::{AuthContext, AuthMethod};

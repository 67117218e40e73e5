//! Request-scoped identity.

/// How a request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    ApiKey,
}

/// Identity bound to a request by the auth gate.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    /// Only known for bearer tokens
    pub email: Option<String>,
    pub method: AuthMethod,
    /// JTI of the access token that authenticated the request
    pub token_id: Option<String>,
}

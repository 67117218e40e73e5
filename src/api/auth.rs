//! Session endpoints.
//!
//! - POST `/register` - Create an account and start a session
//! - POST `/login` - Start a session with email and password
//! - POST `/refresh` - Redeem a refresh token (cookie or JSON body) for a new pair
//! - POST `/logout` - Revoke the current access token and refresh cookie
//! - POST `/logout-all` - Revoke every token of the current user

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, AuthGate, AuthPolicy, REFRESH_COOKIE_NAME, TokenPair, TokenService,
    auth_cookie, clear_cookie, get_cookie, hash_password, require_auth, verify_password,
};
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};

/// Minimum password length for new accounts.
const MIN_PASSWORD_LENGTH: usize = 8;

/// State for session endpoints.
#[derive(Clone)]
pub struct AuthApiState {
    pub db: Database,
    pub tokens: TokenService,
    pub secure_cookies: bool,
}

pub fn router(state: AuthApiState, gate: AuthGate) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route_layer(middleware::from_fn_with_state(
            gate.with_policy(AuthPolicy::Bearer),
            require_auth,
        ));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .merge(protected)
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize, Default)]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

#[derive(Serialize)]
struct UserSummary {
    id: i64,
    name: String,
    email: String,
}

#[derive(Serialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    user: UserSummary,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

// --- Helpers ---

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn session_cookies(pair: &TokenPair, secure: bool) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            auth_cookie(
                ACCESS_COOKIE_NAME,
                &pair.access_token,
                ACCESS_TOKEN_DURATION_SECS,
                secure,
            ),
        ),
        (
            SET_COOKIE,
            auth_cookie(
                REFRESH_COOKIE_NAME,
                &pair.refresh_token,
                REFRESH_TOKEN_DURATION_SECS,
                secure,
            ),
        ),
    ])
}

fn cleared_cookies(secure: bool) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

// --- Handlers ---

async fn register(
    State(state): State<AuthApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if state
        .db
        .users()
        .email_exists(&payload.email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    // The unique index still guards against a concurrent registration
    let user_id = state
        .db
        .users()
        .create(&payload.name, &payload.email, &password_hash)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ApiError::bad_request("Email already registered")
            }
            e => ApiError::db_error("Failed to create user", e),
        })?;

    let pair = state.tokens.issue_pair(user_id, &payload.email).await?;
    info!(user_id, "User registered");

    Ok((
        StatusCode::CREATED,
        session_cookies(&pair, state.secure_cookies),
        Json(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: UserSummary {
                id: user_id,
                name: payload.name,
                email: payload.email,
            },
        }),
    ))
}

async fn login(
    State(state): State<AuthApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let user = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if let Err(e) = state.db.users().touch_last_login(user.id).await {
        warn!(user_id = user.id, "Failed to record login: {}", e);
    }

    let pair = state.tokens.issue_pair(user.id, &user.email).await?;
    info!(user_id = user.id, "User logged in");

    Ok((
        StatusCode::OK,
        session_cookies(&pair, state.secure_cookies),
        Json(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: UserSummary {
                id: user.id,
                name: user.name,
                email: user.email,
            },
        }),
    ))
}

/// Redeem a refresh token. The cookie wins over the body.
async fn refresh(
    State(state): State<AuthApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body;
    let refresh_token = match get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            from_body = if body.is_empty() {
                RefreshRequest::default()
            } else {
                serde_json::from_slice::<RefreshRequest>(&body).unwrap_or_default()
            };
            from_body.refresh_token.as_str()
        }
    };

    if refresh_token.is_empty() {
        return Err(ApiError::unauthorized("No refresh token provided"));
    }

    let (claims, pair) = state.tokens.rotate(refresh_token).await?;
    info!(user_id = claims.user_id, "Token pair refreshed");

    Ok((
        StatusCode::OK,
        session_cookies(&pair, state.secure_cookies),
        Json(pair),
    ))
}

/// Revoke the authenticating access token and, if present, the refresh
/// cookie. Always succeeds and clears both cookies.
async fn logout(
    State(state): State<AuthApiState>,
    Auth(auth): Auth,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token_id) = auth.token_id.as_deref() {
        if let Err(e) = state.tokens.revoke_id_for_user(token_id, auth.user_id).await {
            warn!(user_id = auth.user_id, "Failed to revoke access token: {}", e);
        }
    }

    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Err(e) = state
            .tokens
            .revoke_token_for_user(refresh_token, auth.user_id)
            .await
        {
            warn!(user_id = auth.user_id, "Failed to revoke refresh token: {}", e);
        }
    }

    (
        StatusCode::OK,
        cleared_cookies(state.secure_cookies),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

async fn logout_all(
    State(state): State<AuthApiState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .tokens
        .revoke_all_user_tokens(auth.user_id)
        .await
        .db_err("Failed to logout from all devices")?;
    info!(user_id = auth.user_id, revoked, "Logged out from all devices");

    Ok((
        StatusCode::OK,
        cleared_cookies(state.secure_cookies),
        Json(MessageResponse {
            message: "Logged out from all devices",
        }),
    ))
}

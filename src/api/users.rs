//! Profile and API key endpoints. Bearer authentication only.
//!
//! - GET/PUT `/me` - Read or rename the current user
//! - GET `/api-keys` - List keys with the key string masked
//! - POST `/api-keys` - Create a key; the full key is only returned here
//! - DELETE `/api-keys/{id}` - Delete one of the user's keys

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, validate_required};
use crate::auth::Auth;
use crate::db::{ApiKey, Database};

/// Random bytes per API key; the key string is their hex encoding.
const API_KEY_BYTES: usize = 32;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(get_profile).put(update_profile))
        .route("/api-keys", get(list_api_keys).post(create_api_key))
        .route("/api-keys/{id}", delete(delete_api_key))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Serialize)]
struct ProfileResponse {
    id: i64,
    name: String,
    email: String,
    email_verified: bool,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: String,
}

#[derive(Deserialize)]
struct CreateApiKeyRequest {
    name: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ApiKeyResponse {
    id: i64,
    name: String,
    key: String,
    expires_at: Option<String>,
    last_used_at: Option<String>,
    is_active: bool,
    created_at: String,
}

impl ApiKeyResponse {
    fn new(key: ApiKey, reveal: bool) -> Self {
        let shown = if reveal { key.key.clone() } else { key.masked_key() };
        Self {
            id: key.id,
            name: key.name,
            key: shown,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            is_active: key.is_active,
            created_at: key.created_at,
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// --- Handlers ---

async fn load_profile(db: &Database, user_id: i64) -> Result<ProfileResponse, ApiError> {
    let user = db
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        email_verified: user.email_verified,
        last_login_at: user.last_login_at,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

async fn get_profile(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_profile(&state.db, auth.user_id).await?))
}

async fn update_profile(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    validate_required("name", &payload.name, 100)?;

    let updated = state
        .db
        .users()
        .set_name(auth.user_id, &payload.name)
        .await
        .db_err("Failed to update profile")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(load_profile(&state.db, auth.user_id).await?))
}

async fn list_api_keys(
    State(state): State<UsersState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let keys = state
        .db
        .api_keys()
        .list_by_user(auth.user_id)
        .await
        .db_err("Failed to list API keys")?;

    let response: Vec<ApiKeyResponse> = keys
        .into_iter()
        .map(|k| ApiKeyResponse::new(k, false))
        .collect();

    Ok(Json(response))
}

async fn create_api_key(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    validate_required("name", &payload.name, 100)?;

    let key = generate_api_key();
    let id = state
        .db
        .api_keys()
        .create(auth.user_id, &payload.name, &key, payload.expires_at)
        .await
        .db_err("Failed to create API key")?;

    let created = state
        .db
        .api_keys()
        .get_by_id(id)
        .await
        .db_err("Failed to get created API key")?
        .ok_or_else(|| ApiError::internal("Created API key not found"))?;

    info!(user_id = auth.user_id, key_id = id, "API key created");
    Ok((StatusCode::CREATED, Json(ApiKeyResponse::new(created, true))))
}

async fn delete_api_key(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .api_keys()
        .delete_for_user(id, auth.user_id)
        .await
        .db_err("Failed to delete API key")?;

    if !deleted {
        return Err(ApiError::not_found("API key not found"));
    }

    info!(user_id = auth.user_id, key_id = id, "API key deleted");
    Ok(Json(MessageResponse {
        message: "API key deleted successfully",
    }))
}

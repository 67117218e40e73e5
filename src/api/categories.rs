//! Finance category endpoints. Bearer token or API key.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt, validate_required};
use crate::auth::Auth;
use crate::db::{Category, CategoryFilter, CategoryUpdate, Database, EntryType, NewCategory};

const MAX_NAME_LENGTH: usize = 100;
const DEFAULT_COLOR: &str = "#000000";

#[derive(Clone)]
pub struct CategoriesState {
    pub db: Database,
}

pub fn router(state: CategoriesState) -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateCategoryRequest {
    name: String,
    #[serde(rename = "type")]
    entry_type: EntryType,
    #[serde(default)]
    description: String,
    color: Option<String>,
    #[serde(default)]
    icon: String,
}

#[derive(Deserialize)]
struct UpdateCategoryRequest {
    name: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<EntryType>,
    description: Option<String>,
    color: Option<String>,
    icon: Option<String>,
    is_active: Option<bool>,
}

/// Query filters. Unrecognized values are ignored rather than rejected.
#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    entry_type: Option<String>,
    active: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> CategoryFilter {
        CategoryFilter {
            entry_type: self.entry_type.as_deref().and_then(EntryType::from_str),
            active: match self.active.as_deref() {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Serialize)]
pub(super) struct CategoryResponse {
    id: i64,
    user_id: i64,
    name: String,
    #[serde(rename = "type")]
    entry_type: EntryType,
    description: String,
    color: String,
    icon: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            name: c.name,
            entry_type: c.entry_type,
            description: c.description,
            color: c.color,
            icon: c.icon,
            is_active: c.is_active,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Treat empty strings in an update as "leave unchanged".
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// --- Handlers ---

async fn list_categories(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .db
        .categories()
        .list_by_user(auth.user_id, query.filter())
        .await
        .db_err("Failed to list categories")?;

    let response: Vec<CategoryResponse> =
        categories.into_iter().map(CategoryResponse::from).collect();
    Ok(Json(response))
}

async fn create_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    validate_required("name", &payload.name, MAX_NAME_LENGTH)?;

    let color = payload
        .color
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COLOR);

    let id = state
        .db
        .categories()
        .create(
            auth.user_id,
            &NewCategory {
                name: &payload.name,
                entry_type: payload.entry_type,
                description: &payload.description,
                color,
                icon: &payload.icon,
            },
        )
        .await
        .db_err("Failed to create category")?;

    let category = state
        .db
        .categories()
        .get_for_user(id, auth.user_id)
        .await
        .db_err("Failed to get created category")?
        .ok_or_else(|| ApiError::internal("Created category not found"))?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

async fn get_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .db
        .categories()
        .get_for_user(id, auth.user_id)
        .await
        .db_err("Failed to get category")?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(CategoryResponse::from(category)))
}

async fn update_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if let Some(name) = non_empty(&payload.name) {
        validate_required("name", name, MAX_NAME_LENGTH)?;
    }

    let update = CategoryUpdate {
        name: non_empty(&payload.name),
        entry_type: payload.entry_type,
        description: non_empty(&payload.description),
        color: non_empty(&payload.color),
        icon: non_empty(&payload.icon),
        is_active: payload.is_active,
    };

    let updated = state
        .db
        .categories()
        .update(id, auth.user_id, &update)
        .await
        .db_err("Failed to update category")?;
    if !updated {
        return Err(ApiError::not_found("Category not found"));
    }

    let category = state
        .db
        .categories()
        .get_for_user(id, auth.user_id)
        .await
        .db_err("Failed to get updated category")?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(CategoryResponse::from(category)))
}

/// Categories still referenced by journal entries cannot be deleted.
async fn delete_category(
    State(state): State<CategoriesState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .categories()
        .get_for_user(id, auth.user_id)
        .await
        .db_err("Failed to get category")?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let journal_count = state
        .db
        .categories()
        .count_journals(id)
        .await
        .db_err("Failed to count journal entries")?;
    if journal_count > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete category with existing journal entries. Delete the entries first or deactivate the category.",
        ));
    }

    let deleted = state
        .db
        .categories()
        .delete_for_user(id, auth.user_id)
        .await
        .db_err("Failed to delete category")?;
    if !deleted {
        return Err(ApiError::not_found("Category not found"));
    }

    Ok(Json(MessageResponse {
        message: "Category deleted successfully",
    }))
}

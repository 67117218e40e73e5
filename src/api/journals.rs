//! Finance journal endpoints. Bearer token or API key.
//!
//! Entries inherit their type from their category. Listing is paginated
//! (default 20 per page, at most 100) and ordered newest date first.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::categories::CategoryResponse;
use super::error::{ApiError, ResultExt, parse_date, validate_required};
use crate::auth::Auth;
use crate::db::{
    DATE_FORMAT, Database, EntryType, Journal, JournalFilter, JournalUpdate, NewJournal,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_TITLE_LENGTH: usize = 255;

#[derive(Clone)]
pub struct JournalsState {
    pub db: Database,
}

pub fn router(state: JournalsState) -> Router {
    Router::new()
        .route("/", get(list_journals).post(create_journal))
        .route("/summary", get(summary))
        .route(
            "/{id}",
            get(get_journal).put(update_journal).delete(delete_journal),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateJournalRequest {
    category_id: i64,
    amount: f64,
    title: String,
    #[serde(default)]
    description: String,
    date: Option<String>,
    #[serde(default)]
    payment_method: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    is_recurring: bool,
    #[serde(default)]
    receipt_url: String,
}

#[derive(Deserialize)]
struct UpdateJournalRequest {
    category_id: Option<i64>,
    amount: Option<f64>,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    payment_method: Option<String>,
    location: Option<String>,
    is_recurring: Option<bool>,
    receipt_url: Option<String>,
}

/// List query. Malformed values are ignored rather than rejected.
#[derive(Deserialize, Default)]
struct ListQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    category_id: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> JournalFilter {
        JournalFilter {
            start_date: self.start_date.as_deref().and_then(normalize_date),
            end_date: self.end_date.as_deref().and_then(normalize_date),
            category_id: self.category_id.as_deref().and_then(|c| c.parse().ok()),
            entry_type: self.entry_type.as_deref().and_then(EntryType::from_str),
        }
    }

    /// Page number (1-based) and page size.
    fn pagination(&self) -> (i64, i64) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let page_size = self
            .page_size
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p > 0 && *p <= MAX_PAGE_SIZE)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (page, page_size)
    }
}

#[derive(Deserialize)]
struct SummaryQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
struct JournalResponse {
    id: i64,
    user_id: i64,
    category_id: i64,
    #[serde(rename = "type")]
    entry_type: EntryType,
    amount: f64,
    title: String,
    description: String,
    date: String,
    payment_method: String,
    location: String,
    is_recurring: bool,
    receipt_url: String,
    created_at: String,
    updated_at: String,
    category: CategoryResponse,
}

impl From<Journal> for JournalResponse {
    fn from(j: Journal) -> Self {
        Self {
            id: j.id,
            user_id: j.user_id,
            category_id: j.category_id,
            entry_type: j.entry_type,
            amount: j.amount,
            title: j.title,
            description: j.description,
            date: j.date,
            payment_method: j.payment_method,
            location: j.location,
            is_recurring: j.is_recurring,
            receipt_url: j.receipt_url,
            created_at: j.created_at,
            updated_at: j.updated_at,
            category: CategoryResponse::from(j.category),
        }
    }
}

#[derive(Serialize)]
struct JournalListResponse {
    journals: Vec<JournalResponse>,
    total_count: i64,
    page: i64,
    page_size: i64,
}

#[derive(Serialize)]
struct SummaryResponse {
    total_income: f64,
    total_expense: f64,
    net_balance: f64,
    start_date: String,
    end_date: String,
    entry_count: i64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

// --- Helpers ---

/// Parse a date and re-format it zero-padded, or `None` if malformed.
fn normalize_date(value: &str) -> Option<String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .map(|d| d.format(DATE_FORMAT).to_string())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Look up a category the caller owns, for filing an entry under it.
async fn owned_category_type(
    db: &Database,
    category_id: i64,
    user_id: i64,
) -> Result<EntryType, ApiError> {
    db.categories()
        .get_for_user(category_id, user_id)
        .await
        .db_err("Failed to get category")?
        .map(|c| c.entry_type)
        .ok_or_else(|| ApiError::bad_request("Category not found or doesn't belong to you"))
}

async fn load_journal(db: &Database, id: i64, user_id: i64) -> Result<Journal, ApiError> {
    db.journals()
        .get_for_user(id, user_id)
        .await
        .db_err("Failed to get journal entry")?
        .ok_or_else(|| ApiError::not_found("Journal entry not found"))
}

// --- Handlers ---

async fn create_journal(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    payload: Result<Json<CreateJournalRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    validate_required("title", &payload.title, MAX_TITLE_LENGTH)?;
    if !(payload.amount > 0.0 && payload.amount.is_finite()) {
        return Err(ApiError::bad_request("Amount must be greater than 0"));
    }

    let entry_type = owned_category_type(&state.db, payload.category_id, auth.user_id).await?;

    let date = match non_empty(&payload.date) {
        Some(raw) => parse_date(raw)?,
        None => today(),
    }
    .format(DATE_FORMAT)
    .to_string();

    let id = state
        .db
        .journals()
        .create(
            auth.user_id,
            &NewJournal {
                category_id: payload.category_id,
                entry_type,
                amount: payload.amount,
                title: &payload.title,
                description: &payload.description,
                date: &date,
                payment_method: &payload.payment_method,
                location: &payload.location,
                is_recurring: payload.is_recurring,
                receipt_url: &payload.receipt_url,
            },
        )
        .await
        .db_err("Failed to create journal entry")?;

    let journal = load_journal(&state.db, id, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(JournalResponse::from(journal))))
}

async fn list_journals(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter();
    let (page, page_size) = query.pagination();
    let offset = (page - 1).saturating_mul(page_size);

    let total_count = state
        .db
        .journals()
        .count(auth.user_id, &filter)
        .await
        .db_err("Failed to count journal entries")?;

    let journals = state
        .db
        .journals()
        .list(auth.user_id, &filter, page_size, offset)
        .await
        .db_err("Failed to list journal entries")?;

    Ok(Json(JournalListResponse {
        journals: journals.into_iter().map(JournalResponse::from).collect(),
        total_count,
        page,
        page_size,
    }))
}

async fn get_journal(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let journal = load_journal(&state.db, id, auth.user_id).await?;
    Ok(Json(JournalResponse::from(journal)))
}

/// Partial update. Non-positive amounts and malformed dates are ignored.
async fn update_journal(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateJournalRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    load_journal(&state.db, id, auth.user_id).await?;

    let entry_type = match payload.category_id {
        Some(category_id) => {
            Some(owned_category_type(&state.db, category_id, auth.user_id).await?)
        }
        None => None,
    };

    if let Some(title) = non_empty(&payload.title) {
        validate_required("title", title, MAX_TITLE_LENGTH)?;
    }

    let date = payload.date.as_deref().and_then(normalize_date);

    let update = JournalUpdate {
        category_id: payload.category_id,
        entry_type,
        amount: payload.amount.filter(|a| *a > 0.0 && a.is_finite()),
        title: non_empty(&payload.title),
        description: non_empty(&payload.description),
        date: date.as_deref(),
        payment_method: non_empty(&payload.payment_method),
        location: non_empty(&payload.location),
        is_recurring: payload.is_recurring,
        receipt_url: non_empty(&payload.receipt_url),
    };

    let updated = state
        .db
        .journals()
        .update(id, auth.user_id, &update)
        .await
        .db_err("Failed to update journal entry")?;
    if !updated {
        return Err(ApiError::not_found("Journal entry not found"));
    }

    let journal = load_journal(&state.db, id, auth.user_id).await?;
    Ok(Json(JournalResponse::from(journal)))
}

async fn delete_journal(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .journals()
        .delete_for_user(id, auth.user_id)
        .await
        .db_err("Failed to delete journal entry")?;
    if !deleted {
        return Err(ApiError::not_found("Journal entry not found"));
    }

    Ok(Json(MessageResponse {
        message: "Journal entry deleted successfully",
    }))
}

/// Totals for a date range, defaulting to the first of this month until today.
async fn summary(
    State(state): State<JournalsState>,
    Auth(auth): Auth,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let today = today();
    let start_date = query
        .start_date
        .as_deref()
        .and_then(normalize_date)
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today).format(DATE_FORMAT).to_string());
    let end_date = query
        .end_date
        .as_deref()
        .and_then(normalize_date)
        .unwrap_or_else(|| today.format(DATE_FORMAT).to_string());

    let totals = state
        .db
        .journals()
        .summary(auth.user_id, &start_date, &end_date)
        .await
        .db_err("Failed to compute summary")?;

    Ok(Json(SummaryResponse {
        total_income: totals.total_income,
        total_expense: totals.total_expense,
        net_balance: totals.net_balance(),
        start_date,
        end_date,
        entry_count: totals.entry_count,
    }))
}

mod auth;
mod categories;
mod error;
mod journals;
mod users;

use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};

use crate::auth::{AuthGate, AuthPolicy, TokenService, require_auth};
use crate::db::Database;

/// Create the API router. Each route group gets its own auth policy.
pub fn create_api_router(db: Database, tokens: TokenService, secure_cookies: bool) -> Router {
    let gate = AuthGate::new(tokens.clone(), db.clone(), AuthPolicy::Bearer);
    let either = gate.with_policy(AuthPolicy::Either);

    let auth_state = auth::AuthApiState {
        db: db.clone(),
        tokens,
        secure_cookies,
    };

    let users = users::router(users::UsersState { db: db.clone() }).route_layer(
        middleware::from_fn_with_state(gate.with_policy(AuthPolicy::Bearer), require_auth),
    );

    let categories = categories::router(categories::CategoriesState { db: db.clone() })
        .route_layer(middleware::from_fn_with_state(either.clone(), require_auth));

    let journals = journals::router(journals::JournalsState { db })
        .route_layer(middleware::from_fn_with_state(either, require_auth));

    Router::new()
        .route("/ping", get(ping))
        .nest("/auth", auth::router(auth_state, gate))
        .nest("/users", users)
        .nest("/categories", categories)
        .nest("/journals", journals)
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

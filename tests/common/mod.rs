#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use kaizen::{ServerConfig, auth::TokenService, create_app, db::Database};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Router plus handles on its database and token service.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub tokens: TokenService,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let config = ServerConfig {
            db: db.clone(),
            jwt_secret: b"test-jwt-secret-that-is-long-enough".to_vec(),
            secure_cookies: false,
        };
        let tokens = config.token_service();
        Self {
            app: create_app(&config),
            db,
            tokens,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    /// Register a user and return the parsed response body.
    pub async fn register(&self, name: &str, email: &str) -> Value {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/register",
                None,
                &serde_json::json!({ "name": name, "email": email, "password": TEST_PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    /// Register a user and return their access token.
    pub async fn access_token(&self, name: &str, email: &str) -> String {
        let body = self.register(name, email).await;
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Create an API key for the bearer and return the full key string.
    pub async fn api_key(&self, bearer: &str, name: &str) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/api/users/api-keys",
                Some(bearer),
                &serde_json::json!({ "name": name }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["key"].as_str().unwrap().to_string()
    }

    /// Create a category and return its id.
    pub async fn category(&self, bearer: &str, name: &str, entry_type: &str) -> i64 {
        let response = self
            .send(json_request(
                "POST",
                "/api/categories",
                Some(bearer),
                &serde_json::json!({ "name": name, "type": entry_type }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }

    /// Create a journal entry and return its id.
    pub async fn journal(
        &self,
        bearer: &str,
        category_id: i64,
        amount: f64,
        title: &str,
        date: &str,
    ) -> i64 {
        let response = self
            .send(json_request(
                "POST",
                "/api/journals",
                Some(bearer),
                &serde_json::json!({
                    "category_id": category_id,
                    "amount": amount,
                    "title": title,
                    "date": date,
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn api_key_request(method: &str, uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", key)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the named cookie from the `Set-Cookie` headers.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find_map(|c| {
        c.split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}

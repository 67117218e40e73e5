mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TEST_PASSWORD, TestApp, bearer_request, body_json, cookie_value, json_request, set_cookies};
use serde_json::json;

#[tokio::test]
async fn test_ping() {
    let app = TestApp::new().await;
    let response = app
        .send(Request::get("/api/ping").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "pong");
}

#[tokio::test]
async fn test_register_sets_cookies_and_returns_pair() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({ "name": "Alice", "email": "alice@example.com", "password": TEST_PASSWORD }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.contains("Max-Age=900")));
    assert!(cookies.iter().any(|c| c.contains("Max-Age=604800")));
    assert!(!cookies.iter().any(|c| c.contains("Secure")));

    let access_cookie = cookie_value(&response, "access_token").unwrap();
    let body = body_json(response).await;
    assert_eq!(body["access_token"], access_cookie.as_str());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = TestApp::new().await;

    let cases = [
        json!({ "name": "", "email": "a@example.com", "password": TEST_PASSWORD }),
        json!({ "name": "A", "email": "not-an-email", "password": TEST_PASSWORD }),
        json!({ "name": "A", "email": "a@example.com", "password": "short" }),
        json!({ "name": "A" }),
    ];
    for body in cases {
        let response = app
            .send(json_request("POST", "/api/auth/register", None, &body))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(body_json(response).await["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::new().await;
    app.register("Alice", "alice@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({ "name": "Other", "email": "alice@example.com", "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email already registered");
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = TestApp::new().await;
    app.register("Bob", "bob@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": "bob@example.com", "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);
    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Bob");

    // Login is recorded on the profile
    let token = body["access_token"].as_str().unwrap();
    let profile = body_json(app.send(bearer_request("GET", "/api/users/me", token)).await).await;
    assert!(profile["last_login_at"].as_str().is_some());

    for (email, password) in [
        ("bob@example.com", "wrong-password"),
        ("nobody@example.com", TEST_PASSWORD),
    ] {
        let response = app
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                &json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid email or password");
    }
}

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let app = TestApp::new().await;
    app.register("Bob", "bob@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": "bob-at-example", "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid email address");
}

#[tokio::test]
async fn test_protected_route_requires_credentials() {
    let app = TestApp::new().await;

    let response = app
        .send(Request::get("/api/users/me").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Not authenticated");

    let response = app
        .send(bearer_request("GET", "/api/users/me", "garbage"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_access_cookie_authenticates() {
    let app = TestApp::new().await;
    let token = app.access_token("Carol", "carol@example.com").await;

    let response = app
        .send(
            Request::get("/api/users/me")
                .header(header::COOKIE, format!("access_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "carol@example.com");
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = TestApp::new().await;
    let body = app.register("Dave", "dave@example.com").await;
    let refresh = body["refresh_token"].as_str().unwrap();

    let response = app.send(bearer_request("GET", "/api/users/me", refresh)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_via_body_rotates_once() {
    let app = TestApp::new().await;
    let body = app.register("Erin", "erin@example.com").await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": refresh }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);
    let pair = body_json(response).await;
    let new_access = pair["access_token"].as_str().unwrap();
    assert_ne!(pair["refresh_token"], refresh.as_str());

    let response = app.send(bearer_request("GET", "/api/users/me", new_access)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old refresh token was consumed
    let response = app
        .send(json_request(
            "POST",
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": refresh }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_via_cookie() {
    let app = TestApp::new().await;
    let body = app.register("Frank", "frank@example.com").await;
    let refresh = body["refresh_token"].as_str().unwrap();

    let response = app
        .send(
            Request::post("/api/auth/refresh")
                .header(header::COOKIE, format!("refresh_token={}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_value(&response, "refresh_token").is_some());
}

#[tokio::test]
async fn test_refresh_without_token() {
    let app = TestApp::new().await;
    let response = app
        .send(Request::post("/api/auth/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "No refresh token provided");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::new().await;
    let token = app.access_token("Gina", "gina@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": token }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let app = TestApp::new().await;
    let body = app.register("Hank", "hank@example.com").await;
    let access = body["access_token"].as_str().unwrap();
    let refresh = body["refresh_token"].as_str().unwrap();

    let response = app
        .send(
            Request::post("/api/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .header(header::COOKIE, format!("refresh_token={}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    assert_eq!(body_json(response).await["message"], "Logged out successfully");

    let response = app.send(bearer_request("GET", "/api/users/me", access)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/refresh",
            None,
            &json!({ "refresh_token": refresh }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_auth() {
    let app = TestApp::new().await;
    let response = app
        .send(Request::post("/api/auth/logout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_all_only_affects_caller() {
    let app = TestApp::new().await;
    let first = app.access_token("Ivy", "ivy@example.com").await;
    let login = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": "ivy@example.com", "password": TEST_PASSWORD }),
        ))
        .await;
    let second = body_json(login).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let other = app.access_token("Jack", "jack@example.com").await;

    let response = app
        .send(bearer_request("POST", "/api/auth/logout-all", &first))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Logged out from all devices"
    );

    for token in [&first, &second] {
        let response = app.send(bearer_request("GET", "/api/users/me", token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.send(bearer_request("GET", "/api/users/me", &other)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

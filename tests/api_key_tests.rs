mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestApp, api_key_request, bearer_request, body_json, json_request};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_create_and_list_masks_key() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Alice", "alice@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/users/api-keys",
            Some(&bearer),
            &json!({ "name": "script" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let key = created["key"].as_str().unwrap().to_string();
    assert_eq!(key.len(), 64);
    assert_eq!(created["is_active"], true);
    assert!(created["expires_at"].is_null());

    let listed = body_json(app.send(bearer_request("GET", "/api/users/api-keys", &bearer)).await).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    let masked = listed[0]["key"].as_str().unwrap();
    assert_ne!(masked, key);
    assert_eq!(masked.len(), key.len());
    assert!(masked.starts_with(&key[..4]));
    assert!(masked.ends_with(&key[key.len() - 4..]));
    assert!(masked[4..masked.len() - 4].chars().all(|c| c == '*'));
}

#[tokio::test]
async fn test_api_key_authenticates_finance_routes_only() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Bob", "bob@example.com").await;
    let key = app.api_key(&bearer, "cli").await;

    let response = app.send(api_key_request("GET", "/api/categories", &key)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(api_key_request("GET", "/api/journals", &key)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Profile and key management are bearer-only
    let response = app.send(api_key_request("GET", "/api/users/me", &key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(api_key_request("GET", "/api/categories", "not-a-real-key"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_requests_then_deactivate() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Carol", "carol@example.com").await;
    let key = app.api_key(&bearer, "dashboard").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let router = app.app.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            router
                .oneshot(api_key_request("GET", "/api/categories", &key))
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let stored = app.db.api_keys().get_active_by_key(&key).await.unwrap().unwrap();
    assert!(app.db.api_keys().set_active(stored.id, false).await.unwrap());

    let response = app.send(api_key_request("GET", "/api/categories", &key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_last_used_is_recorded() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Dan", "dan@example.com").await;
    let key = app.api_key(&bearer, "sync").await;

    let response = app.send(api_key_request("GET", "/api/categories", &key)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The update runs in the background
    let mut last_used = None;
    for _ in 0..50 {
        let stored = app.db.api_keys().get_active_by_key(&key).await.unwrap().unwrap();
        if stored.last_used_at.is_some() {
            last_used = stored.last_used_at;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(last_used.is_some());
}

#[tokio::test]
async fn test_expired_key_is_rejected() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Eve", "eve@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/users/api-keys",
            Some(&bearer),
            &json!({ "name": "old", "expires_at": (Utc::now() - Duration::hours(1)).to_rfc3339() }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let key = body_json(response).await["key"].as_str().unwrap().to_string();

    let response = app.send(api_key_request("GET", "/api/categories", &key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_key_requires_ownership() {
    let app = TestApp::new().await;
    let alice = app.access_token("Alice", "alice@example.com").await;
    let mallory = app.access_token("Mallory", "mallory@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/users/api-keys",
            Some(&alice),
            &json!({ "name": "mine" }),
        ))
        .await;
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();
    let key = created["key"].as_str().unwrap().to_string();

    let uri = format!("/api/users/api-keys/{}", id);
    let response = app.send(bearer_request("DELETE", &uri, &mallory)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(bearer_request("DELETE", &uri, &alice)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(api_key_request("GET", "/api/categories", &key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_and_api_key_see_same_data() {
    let app = TestApp::new().await;
    let bearer = app.access_token("Finn", "finn@example.com").await;
    let key = app.api_key(&bearer, "mirror").await;
    app.category(&bearer, "Salary", "income").await;

    let via_key = body_json(app.send(api_key_request("GET", "/api/categories", &key)).await).await;
    let via_bearer =
        body_json(app.send(bearer_request("GET", "/api/categories", &bearer)).await).await;
    assert_eq!(via_key, via_bearer);
    assert_eq!(via_key.as_array().unwrap().len(), 1);
}

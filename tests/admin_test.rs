//! Admin account management.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;

use common::{body_json, get, json_request, spawn_app};

#[tokio::test]
async fn test_members_are_forbidden() {
    let app = spawn_app();
    let cookie = app.login("alice").await;

    let response = app.send(get("/api/admin/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "Forbidden" }));

    let response = app
        .send(json_request(
            Method::POST,
            "/api/admin/users",
            json!({ "username": "bob", "displayName": "Bob" }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_lists_users() {
    let app = spawn_app();
    let cookie = app.login("admin").await;

    let response = app.send(get("/api/admin/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "alice"]);
}

#[tokio::test]
async fn test_admin_creates_user_who_can_log_in() {
    let app = spawn_app();
    let cookie = app.login("admin").await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/admin/users",
            json!({ "username": "Bob_1", "email": "bob@example.com", "displayName": " Bob " }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "bob_1");
    assert_eq!(body["user"]["displayName"], "Bob");
    assert_eq!(body["user"]["role"], "MEMBER");

    app.login("bob@example.com").await;
}

#[tokio::test]
async fn test_create_user_conflicts_and_validation() {
    let app = spawn_app();
    let cookie = app.login("admin").await;
    let create = |body: serde_json::Value| json_request(Method::POST, "/api/admin/users", body, Some(&cookie));

    let response = app
        .send(create(json!({ "username": "alice", "displayName": "Another Alice" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await, json!({ "error": "Username already exists." }));

    let response = app
        .send(create(json!({ "username": "alicia", "email": "alice@example.com", "displayName": "Alicia" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await, json!({ "error": "Email already exists." }));

    let response = app
        .send(create(json!({ "username": "x", "displayName": "X" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Invalid user payload." }));
}

#[tokio::test]
async fn test_admin_sets_social_counts() {
    let app = spawn_app();
    let admin = app.login("admin").await;
    let alice_id = app.state.users.find_by_identifier("alice").unwrap().id;
    let patch = |uri: String, body: serde_json::Value, cookie: &str| {
        json_request(Method::PATCH, &uri, body, Some(cookie))
    };

    let response = app
        .send(patch(
            format!("/api/admin/users/{alice_id}"),
            json!({ "followers": 1200, "following": 35 }),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "user": {
            "id": alice_id,
            "username": "alice",
            "displayName": "Alice",
            "followers": 1200,
            "following": 35,
        }})
    );

    let alice = app.login("alice").await;
    let body = body_json(app.send(get("/api/me", Some(&alice))).await).await;
    assert_eq!(body["user"]["followers"], 1200);

    let response = app
        .send(patch(
            format!("/api/admin/users/{alice_id}"),
            json!({ "followers": 1 }),
            &alice,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for bad in [
        json!({ "followers": -1, "following": 0 }),
        json!({ "followers": 100_000_001, "following": 0 }),
        json!({ "followers": 1 }),
    ] {
        let response = app
            .send(patch(format!("/api/admin/users/{alice_id}"), bad, &admin))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Invalid social counts payload." }));
    }

    let response = app
        .send(patch(
            "/api/admin/users/nobody".into(),
            json!({ "followers": 1, "following": 1 }),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "User not found." }));
}

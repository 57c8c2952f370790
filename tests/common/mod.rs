//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use huddle::auth::UserRole;
use huddle::config::{AppConfig, UserSeed};
use huddle::http::{build_router, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";
pub const BOUNDARY: &str = "huddle-test-boundary";

/// A complete 2x2 RGB PNG.
pub const PNG_2X2: [u8; 73] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0xFD, 0xD4, 0x9A,
    0x73, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
    0x44, 0x0C, 0x10, 0x0A, 0x00, 0x1F, 0xEE, 0x03, 0xFD, 0x8B, 0x5F, 0x14, 0xD4, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Log in and return the `name=value` cookie pair.
    pub async fn login(&self, identifier: &str) -> String {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/auth/login",
                serde_json::json!({ "identifier": identifier, "password": PASSWORD }),
                None,
            ))
            .await;
        assert_eq!(response.status(), 200, "login as {identifier} failed");
        session_pair(&response).expect("login response sets a cookie")
    }
}

pub fn test_config(upload_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.session_secret = "integration-secret".into();
    config.auth.shared_password = PASSWORD.into();
    config.uploads.base_dir = upload_dir.display().to_string();
    config.users = vec![
        UserSeed {
            username: "admin".into(),
            email: None,
            display_name: "Admin".into(),
            role: UserRole::Admin,
        },
        UserSeed {
            username: "alice".into(),
            email: Some("alice@example.com".into()),
            display_name: "Alice".into(),
            role: UserRole::Member,
        },
    ];
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(|_| {})
}

pub fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(upload_dir.path());
    customize(&mut config);
    let state = AppState::new(config).unwrap();
    TestApp {
        router: build_router(state.clone()),
        state,
        upload_dir,
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// `POST uri` with a single multipart file part named `field`.
pub fn multipart_request(uri: &str, cookie: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The `name=value` part of the response's `Set-Cookie`.
pub fn session_pair(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

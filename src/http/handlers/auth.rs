//! Login and logout.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::cookie::{clear_cookie, read_cookie, session_cookie};
use crate::auth::SafeUser;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

impl LoginRequest {
    /// Trimmed identifier of 3 to 100 characters and a password of 1 to 200.
    fn validated(self) -> Option<(String, String)> {
        let identifier = self.identifier.trim().to_string();
        let identifier_ok = (3..=100).contains(&identifier.chars().count());
        let password_ok = (1..=200).contains(&self.password.chars().count());
        (identifier_ok && password_ok).then_some((identifier, self.password))
    }
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let (identifier, password) = payload
        .ok()
        .and_then(|Json(body)| body.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid login payload.".into()))?;

    if !state.password.verify(&password) {
        metrics::record_login("invalid_credentials");
        tracing::info!("Login rejected: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let Some(user) = state.users.find_by_identifier(&identifier) else {
        metrics::record_login("unknown_account");
        tracing::info!(identifier = %identifier, "Login rejected: unknown account");
        return Err(ApiError::Forbidden("Account not found. Contact an admin.".into()));
    };

    let token = state.sessions.create(user.id);
    let auth = &state.config.auth;
    let cookie = session_cookie(
        &auth.cookie_name,
        &token,
        state.sessions.max_age().as_secs(),
        auth.secure_cookie,
    )
    .ok_or_else(|| ApiError::Internal("session cookie is not a valid header value".into()))?;

    metrics::record_login("success");
    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "user": SafeUser::from(&user) })),
    ))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let auth = &state.config.auth;
    if let Some(token) = read_cookie(&headers, &auth.cookie_name) {
        if state.sessions.revoke(token) {
            tracing::info!("Session revoked");
        }
    }

    let cookie = clear_cookie(&auth.cookie_name, auth.secure_cookie)
        .ok_or_else(|| ApiError::Internal("session cookie is not a valid header value".into()))?;
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "ok": true })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(identifier: &str, password: &str) -> LoginRequest {
        LoginRequest {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_login_payload_bounds() {
        assert_eq!(
            request("  alice ", "pw").validated(),
            Some(("alice".to_string(), "pw".to_string()))
        );
        assert!(request("ab", "pw").validated().is_none());
        assert!(request("   ab   ", "pw").validated().is_none());
        assert!(request(&"a".repeat(101), "pw").validated().is_none());
        assert!(request("alice", "").validated().is_none());
        assert!(request("alice", &"p".repeat(201)).validated().is_none());
    }
}

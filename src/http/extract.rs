//! Session-backed extractors.
//!
//! The gate only checks that a session cookie is present; these extractors
//! resolve it to a live session and an account.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::cookie::read_cookie;
use crate::auth::User;
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// The account behind the request's session cookie.
///
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> ApiResult<Json<Value>> { ... }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(ApiError::Unauthorized)?;
        let user_id = state.sessions.resolve(token).ok_or(ApiError::Unauthorized)?;
        let user = state.users.find_by_id(user_id).ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

/// [`CurrentUser`] restricted to admins; members get 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Forbidden".into()));
        }
        Ok(AdminUser(user))
    }
}

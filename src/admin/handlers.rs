use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::users::{is_valid_username, normalize_identifier};
use crate::auth::{NewUser, SafeUser, UserRole};
use crate::http::extract::AdminUser;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;

const MAX_EMAIL_CHARS: usize = 320;
const MAX_DISPLAY_NAME_CHARS: usize = 80;
const MAX_SOCIAL_COUNT: u32 = 100_000_000;

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Value> {
    let users: Vec<SafeUser> = state.users.list().iter().map(SafeUser::from).collect();
    Json(json!({ "users": users }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub display_name: String,
}

impl CreateUserRequest {
    /// Accounts created here are always members. An empty email means none.
    fn validated(self) -> Option<NewUser> {
        let username = normalize_identifier(&self.username);
        if !is_valid_username(&username) {
            return None;
        }

        let email = match self.email.map(|e| normalize_identifier(&e)) {
            Some(email) if email.is_empty() => None,
            Some(email) if looks_like_email(&email) && email.len() <= MAX_EMAIL_CHARS => Some(email),
            Some(_) => return None,
            None => None,
        };

        let display_name = self.display_name.trim().to_string();
        let len = display_name.chars().count();
        if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
            return None;
        }

        Some(NewUser {
            username,
            email,
            display_name,
            role: UserRole::Member,
        })
    }
}

/// `local@domain.tld` with no whitespace.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
        && !email.chars().any(char::is_whitespace)
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let new_user = payload
        .ok()
        .and_then(|Json(body)| body.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid user payload.".into()))?;

    let user = state.users.create(new_user)?;
    tracing::info!(admin_id = %admin.id, user_id = %user.id, username = %user.username, "User created");

    Ok((StatusCode::CREATED, Json(json!({ "user": SafeUser::from(&user) }))))
}

#[derive(Debug, Deserialize)]
pub struct SocialCountsRequest {
    pub followers: u32,
    pub following: u32,
}

impl SocialCountsRequest {
    fn validated(self) -> Option<(u32, u32)> {
        (self.followers <= MAX_SOCIAL_COUNT && self.following <= MAX_SOCIAL_COUNT)
            .then_some((self.followers, self.following))
    }
}

pub async fn update_social_counts(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    payload: Result<Json<SocialCountsRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let (followers, following) = payload
        .ok()
        .and_then(|Json(body)| body.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid social counts payload.".into()))?;

    let user = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.users.set_social_counts(id, followers, following))
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;
    tracing::info!(admin_id = %admin.id, user_id = %user.id, followers, following, "Social counts updated");

    Ok(Json(json!({
        "user": {
            "id": user.id,
            "username": user.username,
            "displayName": user.display_name,
            "followers": user.followers,
            "following": user.following,
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: Option<&str>, display_name: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            email: email.map(Into::into),
            display_name: display_name.into(),
        }
    }

    #[test]
    fn test_create_user_payload() {
        let user = request(" Bob_1 ", Some(" Bob@Example.com "), " Bob ")
            .validated()
            .unwrap();
        assert_eq!(user.username, "bob_1");
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));
        assert_eq!(user.display_name, "Bob");
        assert_eq!(user.role, UserRole::Member);

        assert!(request("bob", Some(""), "Bob").validated().unwrap().email.is_none());
        assert!(request("bo", None, "Bob").validated().is_none());
        assert!(request("bob-1", None, "Bob").validated().is_none());
        assert!(request("bob", Some("not-an-email"), "Bob").validated().is_none());
        assert!(request("bob", None, "  ").validated().is_none());
    }

    #[test]
    fn test_social_counts_bounds() {
        let counts = |followers, following| SocialCountsRequest { followers, following }.validated();
        assert_eq!(counts(0, 0), Some((0, 0)));
        assert_eq!(counts(100_000_000, 5), Some((100_000_000, 5)));
        assert!(counts(100_000_001, 0).is_none());
        assert!(counts(0, 100_000_001).is_none());
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("a b@c.co"));
        assert!(!looks_like_email("a@b..co"));
    }
}
